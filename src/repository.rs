//! Capability lookup repositories
//!
//! Three implementations of the same lookup contract: a local repository
//! over an explicit resource set, an external repository loaded from a TOML
//! index file (the directory-style provider service), and a composite that
//! queries an ordered member list and returns the union.
//!
//! Resolution treats the first capability returned by the composite for a
//! given requirement as authoritative; with identical member order and
//! resource ordering the chosen provider is identical across runs.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::location::parse_version;
use crate::resource::{
    identity_capability, types, Capability, Filter, Requirement, Resource, ResourceIdentity,
};

/// The capability-lookup contract shared by all repository variants.
pub trait Repository: Send + Sync {
    /// Every capability satisfying `requirement`, in source order. Fails
    /// only when the underlying lookup itself fails, never because nothing
    /// matched.
    fn find_providers(&self, requirement: &Requirement) -> Result<Vec<Capability>>;
}

/// A repository backed by an explicit resource set.
pub struct LocalRepository {
    resources: Vec<Arc<dyn Resource>>,
}

impl LocalRepository {
    pub fn new(resources: Vec<Arc<dyn Resource>>) -> LocalRepository {
        LocalRepository { resources }
    }

    pub fn resources(&self) -> &[Arc<dyn Resource>] {
        &self.resources
    }
}

impl Repository for LocalRepository {
    fn find_providers(&self, requirement: &Requirement) -> Result<Vec<Capability>> {
        let mut providers = Vec::new();
        for resource in &self.resources {
            for capability in resource.capabilities(Some(requirement.namespace())) {
                if requirement.matches(&capability) {
                    providers.push(capability);
                }
            }
        }
        Ok(providers)
    }
}

/// An empty external repository, used when no provider service is injected.
pub struct EmptyRepository;

impl Repository for EmptyRepository {
    fn find_providers(&self, _requirement: &Requirement) -> Result<Vec<Capability>> {
        Ok(Vec::new())
    }
}

/// Queries an ordered member list and unions the results without
/// deduplication.
pub struct CompositeRepository {
    members: Vec<Arc<dyn Repository>>,
}

impl CompositeRepository {
    pub fn new(members: Vec<Arc<dyn Repository>>) -> CompositeRepository {
        CompositeRepository { members }
    }
}

impl Repository for CompositeRepository {
    fn find_providers(&self, requirement: &Requirement) -> Result<Vec<Capability>> {
        let mut providers = Vec::new();
        for member in &self.members {
            providers.extend(member.find_providers(requirement)?);
        }
        Ok(providers)
    }
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    resources: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    version: String,
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default)]
    capabilities: Vec<IndexCapability>,
    #[serde(default)]
    requirements: Vec<IndexRequirement>,
}

fn default_kind() -> String {
    types::MODULE.to_string()
}

#[derive(Debug, Deserialize)]
struct IndexCapability {
    namespace: String,
    #[serde(default)]
    attributes: IndexMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct IndexRequirement {
    namespace: String,
    #[serde(default)]
    filter: IndexMap<String, String>,
    #[serde(default)]
    optional: bool,
}

/// A resource served by an external index; declares its capabilities and
/// requirements directly instead of deriving them from archive contents.
pub struct IndexedResource {
    identity: ResourceIdentity,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl IndexedResource {
    fn from_entry(entry: IndexEntry) -> Result<Arc<IndexedResource>> {
        let identity = ResourceIdentity::new(
            entry.name,
            parse_version(&entry.version)?,
            entry.kind,
        );
        Ok(Arc::new_cyclic(|me: &Weak<IndexedResource>| {
            let owner: Weak<dyn Resource> = me.clone();
            let mut capabilities = vec![identity_capability(&identity, owner.clone())];
            for cap in &entry.capabilities {
                capabilities.push(Capability::new(
                    cap.namespace.clone(),
                    cap.attributes.clone(),
                    owner.clone(),
                ));
            }
            let requirements = entry
                .requirements
                .iter()
                .map(|req| {
                    let mut filter = Filter::new();
                    for (key, value) in &req.filter {
                        filter = filter.with(key.clone(), value.clone());
                    }
                    let mut requirement = Requirement::new(req.namespace.clone(), filter);
                    if req.optional {
                        requirement = requirement.optional();
                    }
                    requirement.attach_owner(owner.clone());
                    requirement
                })
                .collect();
            IndexedResource {
                identity,
                capabilities,
                requirements,
            }
        }))
    }
}

impl Resource for IndexedResource {
    fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    fn capabilities(&self, namespace: Option<&str>) -> Vec<Capability> {
        crate::resource::filter_by_namespace(&self.capabilities, namespace, |c| c.namespace())
    }

    fn requirements(&self, namespace: Option<&str>) -> Vec<Requirement> {
        crate::resource::filter_by_namespace(&self.requirements, namespace, |r| r.namespace())
    }
}

/// The shipped external repository: resources declared in a TOML index
/// file, served through the same lookup contract as everything else.
pub struct IndexRepository {
    inner: LocalRepository,
}

impl IndexRepository {
    pub fn parse(text: &str) -> Result<IndexRepository> {
        let index: IndexFile = toml::from_str(text)
            .map_err(|e| Error::Resolution(format!("invalid repository index: {e}")))?;
        let mut resources: Vec<Arc<dyn Resource>> = Vec::new();
        for entry in index.resources {
            resources.push(IndexedResource::from_entry(entry)?);
        }
        Ok(IndexRepository {
            inner: LocalRepository::new(resources),
        })
    }

    pub fn from_file(path: &Path) -> Result<IndexRepository> {
        let text = fs::read_to_string(path)?;
        IndexRepository::parse(&text)
    }

    /// The indexed resources, in declaration order.
    pub fn resources(&self) -> &[Arc<dyn Resource>] {
        self.inner.resources()
    }
}

impl Repository for IndexRepository {
    fn find_providers(&self, requirement: &Requirement) -> Result<Vec<Capability>> {
        self.inner.find_providers(requirement)
    }
}
