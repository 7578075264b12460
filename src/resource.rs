//! Resources, capabilities, and requirements
//!
//! A resource is anything that can take part in resolution: a leaf module
//! archive, a (possibly nested) unit, or an entry served by an external
//! repository index. Resources expose namespaced capabilities and
//! requirements; capabilities carry a non-owning back-reference to the
//! resource that offers them.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use semver::Version;

use crate::archive::MODULE_EXTENSION;
use crate::location::{parse_version, zero_version};

/// Capability/requirement namespaces. The `unit.` prefix is reserved for
/// the resolver itself; requirements in reserved namespaces never surface
/// in synthesized require-capability headers.
pub mod namespaces {
    /// Resource identity (symbolic name + version + type).
    pub const IDENTITY: &str = "unit.identity";
    /// Code package wiring; synthesized into `Import-Package`.
    pub const PACKAGE: &str = "unit.wiring.package";
    /// Module wiring; synthesized into `Require-Module`.
    pub const MODULE: &str = "unit.wiring.module";
    /// Reserved namespace prefix.
    pub const RESERVED_PREFIX: &str = "unit.";
}

/// Resource type identifiers carried in identity attributes and type headers.
pub mod types {
    pub const APPLICATION: &str = "unit.application";
    pub const COMPOSITE: &str = "unit.composite";
    pub const MODULE: &str = "unit.module";
}

/// Well-known identity attribute keys.
pub mod attributes {
    pub const NAME: &str = "unit.identity";
    pub const VERSION: &str = "version";
    pub const TYPE: &str = "type";
}

/// Hashable resource identity used for closure deduplication and cycle
/// safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub name: String,
    pub version: Version,
    pub kind: String,
}

impl ResourceIdentity {
    pub fn new(name: impl Into<String>, version: Version, kind: impl Into<String>) -> Self {
        ResourceIdentity {
            name: name.into(),
            version,
            kind: kind.into(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A namespaced assertion a resource offers. Produced only by resources and
/// manifests, never constructed independently by callers.
#[derive(Clone)]
pub struct Capability {
    namespace: String,
    attributes: IndexMap<String, String>,
    owner: Weak<dyn Resource>,
}

impl Capability {
    pub(crate) fn new(
        namespace: impl Into<String>,
        attributes: IndexMap<String, String>,
        owner: Weak<dyn Resource>,
    ) -> Capability {
        let namespace = namespace.into();
        debug_assert!(!namespace.is_empty());
        Capability {
            namespace,
            attributes,
            owner,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// The resource offering this capability, if it is still alive.
    pub fn owner(&self) -> Option<Arc<dyn Resource>> {
        self.owner.upgrade()
    }
}

// Owner is a weak trait object; keep it out of debug output.
impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("namespace", &self.namespace)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// The requirement-to-capability predicate: a conjunction of attribute
/// equalities. Stands in for a full filter language, whose semantics are an
/// external collaborator's concern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    equals: IndexMap<String, String>,
}

impl Filter {
    pub fn new() -> Filter {
        Filter::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Filter {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn entries(&self) -> &IndexMap<String, String> {
        &self.equals
    }

    pub fn matches(&self, attributes: &IndexMap<String, String>) -> bool {
        self.equals
            .iter()
            .all(|(key, value)| attributes.get(key) == Some(value))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.equals {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        Ok(())
    }
}

/// A namespaced predicate a resource needs satisfied by some capability.
#[derive(Clone)]
pub struct Requirement {
    namespace: String,
    filter: Filter,
    optional: bool,
    owner: Weak<dyn Resource>,
}

impl Requirement {
    pub fn new(namespace: impl Into<String>, filter: Filter) -> Requirement {
        let namespace = namespace.into();
        debug_assert!(!namespace.is_empty());
        Requirement {
            namespace,
            filter,
            optional: false,
            owner: detached_owner(),
        }
    }

    pub fn optional(mut self) -> Requirement {
        self.optional = true;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn owner(&self) -> Option<Arc<dyn Resource>> {
        self.owner.upgrade()
    }

    pub(crate) fn attach_owner(&mut self, owner: Weak<dyn Resource>) {
        self.owner = owner;
    }

    /// Whether `capability` satisfies this requirement.
    pub fn matches(&self, capability: &Capability) -> bool {
        self.namespace == capability.namespace() && self.filter.matches(capability.attributes())
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("namespace", &self.namespace)
            .field("filter", &self.filter)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// A dangling owner reference for requirements built before their resource
/// exists; the orchestrator attaches the real owner at assembly time.
pub(crate) fn detached_owner() -> Weak<dyn Resource> {
    let weak: Weak<dyn Resource> = Weak::<ModuleResource>::new();
    weak
}

/// Polymorphic resolution participant.
pub trait Resource: Send + Sync {
    fn identity(&self) -> &ResourceIdentity;

    /// Capabilities offered, optionally filtered by namespace, in
    /// declaration order.
    fn capabilities(&self, namespace: Option<&str>) -> Vec<Capability>;

    /// Requirements needed, optionally filtered by namespace, in
    /// declaration order.
    fn requirements(&self, namespace: Option<&str>) -> Vec<Requirement>;
}

pub(crate) fn filter_by_namespace<T: Clone>(
    items: &[T],
    namespace: Option<&str>,
    namespace_of: impl Fn(&T) -> &str,
) -> Vec<T> {
    match namespace {
        None => items.to_vec(),
        Some(ns) => items
            .iter()
            .filter(|item| namespace_of(item) == ns)
            .cloned()
            .collect(),
    }
}

/// Build the identity capability for a resource.
pub(crate) fn identity_capability(
    identity: &ResourceIdentity,
    owner: Weak<dyn Resource>,
) -> Capability {
    let mut attrs = IndexMap::new();
    attrs.insert(attributes::NAME.to_string(), identity.name.clone());
    attrs.insert(attributes::VERSION.to_string(), identity.version.to_string());
    attrs.insert(attributes::TYPE.to_string(), identity.kind.clone());
    Capability::new(namespaces::IDENTITY, attrs, owner)
}

/// A leaf module archive, identified purely by its entry name and location;
/// its contents are never inspected during resolution.
pub struct ModuleResource {
    identity: ResourceIdentity,
    location: String,
    capabilities: Vec<Capability>,
}

impl ModuleResource {
    /// Wrap a directory entry named `name[@version].jar`. A version token
    /// that does not parse is treated as part of the name.
    pub fn from_entry(file_name: &str, location: String) -> Arc<ModuleResource> {
        let stem = file_name
            .strip_suffix(MODULE_EXTENSION)
            .unwrap_or(file_name);
        let (name, version) = match stem.split_once('@') {
            Some((name, token)) => match parse_version(token) {
                Ok(version) => (name.to_string(), version),
                Err(_) => (stem.to_string(), zero_version()),
            },
            None => (stem.to_string(), zero_version()),
        };
        let identity = ResourceIdentity::new(name, version, types::MODULE);
        Arc::new_cyclic(|me: &Weak<ModuleResource>| {
            let owner: Weak<dyn Resource> = me.clone();
            let capabilities = vec![identity_capability(&identity, owner)];
            ModuleResource {
                identity,
                location,
                capabilities,
            }
        })
    }

    /// The addressable location of the wrapped entry.
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Resource for ModuleResource {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn capabilities(&self, namespace: Option<&str>) -> Vec<Capability> {
        filter_by_namespace(&self.capabilities, namespace, |c| c.namespace())
    }

    fn requirements(&self, _namespace: Option<&str>) -> Vec<Requirement> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_identity_from_versioned_entry() {
        let module = ModuleResource::from_entry("bar@2.1.0.jar", "/tmp/bar.jar".into());
        assert_eq!(module.identity().name, "bar");
        assert_eq!(module.identity().version, Version::new(2, 1, 0));
        assert_eq!(module.identity().kind, types::MODULE);
    }

    #[test]
    fn test_module_identity_defaults_to_zero_version() {
        let module = ModuleResource::from_entry("bar.jar", "bar.jar".into());
        assert_eq!(module.identity().name, "bar");
        assert_eq!(module.identity().version, zero_version());
    }

    #[test]
    fn test_identity_capability_owner_back_reference() {
        let module = ModuleResource::from_entry("bar.jar", "bar.jar".into());
        let caps = module.capabilities(Some(namespaces::IDENTITY));
        assert_eq!(caps.len(), 1);
        let owner = caps[0].owner().expect("owner should be alive");
        assert_eq!(owner.identity(), module.identity());
    }

    #[test]
    fn test_namespace_filtering_excludes_other_namespaces() {
        let module = ModuleResource::from_entry("bar.jar", "bar.jar".into());
        assert!(module.capabilities(Some(namespaces::PACKAGE)).is_empty());
        assert_eq!(module.capabilities(None).len(), 1);
    }

    #[test]
    fn test_requirement_matching() {
        let module = ModuleResource::from_entry("bar@1.0.0.jar", "bar.jar".into());
        let cap = &module.capabilities(Some(namespaces::IDENTITY))[0];

        let matching = Requirement::new(
            namespaces::IDENTITY,
            Filter::new().with(attributes::NAME, "bar"),
        );
        assert!(matching.matches(cap));

        let wrong_name = Requirement::new(
            namespaces::IDENTITY,
            Filter::new().with(attributes::NAME, "baz"),
        );
        assert!(!wrong_name.matches(cap));

        let wrong_namespace = Requirement::new(
            namespaces::PACKAGE,
            Filter::new().with(attributes::NAME, "bar"),
        );
        assert!(!wrong_namespace.matches(cap));
    }
}
