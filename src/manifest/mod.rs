//! Unit and deployment manifest model
//!
//! A manifest is an insertion-ordered collection of uniquely named headers.
//! The raw on-disk form is line-oriented (`Name: value`, continuation lines
//! start with a space); per-kind clause parsing lives in [`header`].
//!
//! [`ManifestBuilder`] supports the two-phase synthesis the orchestrator
//! performs: copy an existing manifest, then insert or replace individual
//! headers. Precedence rules (existing wins unless absent) are decided by
//! the orchestrator's compute functions, not by the builder.

pub mod header;

use std::fmt;
use std::sync::Weak;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::location::zero_version;
use crate::resource::{
    identity_capability, Capability, Requirement, Resource, ResourceIdentity,
};

use header::{
    names, ContentHeader, Header, RequirementHeader, SymbolicNameHeader, TypeHeader,
    VersionHeader,
};

/// An ordered header collection with typed accessors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    headers: IndexMap<String, Header>,
}

impl Manifest {
    /// Parse raw manifest text: `Name: value` lines, with continuation
    /// lines prefixed by a single space. Duplicate header names are
    /// structural errors.
    pub fn parse(text: &str) -> Result<Manifest> {
        let mut entries: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                match entries.last_mut() {
                    Some((_, value)) => value.push_str(continuation.trim_end()),
                    None => {
                        return Err(Error::Manifest(
                            "continuation line with no preceding header".to_string(),
                        ));
                    }
                }
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Manifest(format!("malformed header line '{line}'")))?;
            entries.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut headers = IndexMap::new();
        for (name, value) in entries {
            let header = Header::parse(&name, &value)?;
            if headers.insert(name.clone(), header).is_some() {
                return Err(Error::Manifest(format!("duplicate header '{name}'")));
            }
        }
        Ok(Manifest { headers })
    }

    pub fn header(&self, name: &str) -> Option<&Header> {
        self.headers.get(name)
    }

    /// Headers in declaration order.
    pub fn headers(&self) -> impl Iterator<Item = &Header> {
        self.headers.values()
    }

    pub fn symbolic_name(&self) -> Option<&SymbolicNameHeader> {
        match self.header(names::SYMBOLIC_NAME) {
            Some(Header::SymbolicName(header)) => Some(header),
            _ => None,
        }
    }

    pub fn version(&self) -> Option<&VersionHeader> {
        match self.header(names::VERSION) {
            Some(Header::Version(header)) => Some(header),
            _ => None,
        }
    }

    /// The type header, defaulted to `unit.application` when absent.
    pub fn unit_type(&self) -> TypeHeader {
        match self.header(names::TYPE) {
            Some(Header::Type(header)) => header.clone(),
            _ => TypeHeader::default(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.unit_type().is_composite()
    }

    pub fn content(&self) -> Option<&ContentHeader> {
        match self.header(names::CONTENT) {
            Some(Header::Content(header)) => Some(header),
            _ => None,
        }
    }

    pub fn import_package(&self) -> Option<&RequirementHeader> {
        match self.header(names::IMPORT_PACKAGE) {
            Some(Header::ImportPackage(header)) => Some(header),
            _ => None,
        }
    }

    pub fn require_module(&self) -> Option<&RequirementHeader> {
        match self.header(names::REQUIRE_MODULE) {
            Some(Header::RequireModule(header)) => Some(header),
            _ => None,
        }
    }

    pub fn require_capability(&self) -> Option<&RequirementHeader> {
        match self.header(names::REQUIRE_CAPABILITY) {
            Some(Header::RequireCapability(header)) => Some(header),
            _ => None,
        }
    }

    /// The identity described by the finalized manifest. Symbolic name is
    /// required; version defaults to zero and type to application.
    pub fn identity(&self) -> Option<ResourceIdentity> {
        let name = self.symbolic_name()?.name.clone();
        let version = self
            .version()
            .map(|header| header.version.clone())
            .unwrap_or_else(zero_version);
        Some(ResourceIdentity::new(name, version, self.unit_type().value))
    }

    /// Requirements declared by this manifest's requirement headers, in
    /// header order.
    pub fn to_requirements(&self) -> Vec<Requirement> {
        let mut requirements = Vec::new();
        if let Some(header) = self.import_package() {
            requirements.extend(header.import_package_requirements());
        }
        if let Some(header) = self.require_module() {
            requirements.extend(header.require_module_requirements());
        }
        if let Some(header) = self.require_capability() {
            requirements.extend(header.require_capability_requirements());
        }
        requirements
    }

    /// The unit's own offered capabilities: a pure function of the
    /// finalized manifest, one identity capability and nothing else.
    pub fn to_capabilities(&self, owner: Weak<dyn Resource>) -> Vec<Capability> {
        match self.identity() {
            Some(identity) => vec![identity_capability(&identity, owner)],
            None => Vec::new(),
        }
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for header in self.headers.values() {
            writeln!(f, "{}: {}", header.name(), header.value())?;
        }
        Ok(())
    }
}

/// Builder merging an existing manifest with newly computed headers.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    headers: IndexMap<String, Header>,
}

impl ManifestBuilder {
    pub fn new() -> ManifestBuilder {
        ManifestBuilder::default()
    }

    /// Seed the builder with every header of `manifest`.
    pub fn manifest(mut self, manifest: &Manifest) -> ManifestBuilder {
        for header in manifest.headers() {
            self.headers
                .insert(header.name().to_string(), header.clone());
        }
        self
    }

    /// Insert a header, replacing any previous header of the same name.
    pub fn header(mut self, header: Header) -> ManifestBuilder {
        self.headers.insert(header.name().to_string(), header);
        self
    }

    pub fn build(self) -> Manifest {
        Manifest {
            headers: self.headers,
        }
    }
}

/// The optional deployment manifest: same structure, deployment header kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentManifest {
    manifest: Manifest,
}

impl DeploymentManifest {
    pub fn parse(text: &str) -> Result<DeploymentManifest> {
        Ok(DeploymentManifest {
            manifest: Manifest::parse(text)?,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn deployed_content(&self) -> Option<&ContentHeader> {
        match self.manifest.header(names::DEPLOYED_CONTENT) {
            Some(Header::DeployedContent(header)) => Some(header),
            _ => None,
        }
    }
}
