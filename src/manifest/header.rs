//! Manifest header kinds and clause grammar
//!
//! A header value is a comma-separated list of clauses; each clause is a
//! primary value followed by `;key=value` attributes. Attribute values may
//! be quoted to protect commas and semicolons. Every header kind parses
//! from raw clause text and serializes back to it.

use std::fmt;

use indexmap::IndexMap;
use semver::Version;

use crate::error::{Error, Result};
use crate::location::{parse_version, zero_version};
use crate::resource::{attributes, namespaces, types, Filter, Requirement, ResourceIdentity};

/// Header names recognized by the resolver. Anything else round-trips
/// through [`GenericHeader`] untouched.
pub mod names {
    pub const SYMBOLIC_NAME: &str = "Unit-SymbolicName";
    pub const VERSION: &str = "Unit-Version";
    pub const TYPE: &str = "Unit-Type";
    pub const CONTENT: &str = "Unit-Content";
    pub const IMPORT_PACKAGE: &str = "Import-Package";
    pub const REQUIRE_MODULE: &str = "Require-Module";
    pub const REQUIRE_CAPABILITY: &str = "Require-Capability";
    pub const DEPLOYED_CONTENT: &str = "Deployed-Content";
}

/// Split `raw` on `separator`, honoring double-quoted sections.
fn split_quoted(raw: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            c if c == separator && !in_quotes => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            c => current.push(c),
        }
    }
    let last = current.trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last.to_string());
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

fn quote_if_needed(value: &str) -> String {
    if value.contains([',', ';', ' ']) {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// One clause: a primary value plus ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub value: String,
    pub attributes: IndexMap<String, String>,
}

impl Clause {
    pub fn new(value: impl Into<String>) -> Clause {
        Clause {
            value: value.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Clause {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn parse(text: &str) -> Result<Clause> {
        let mut pieces = split_quoted(text, ';').into_iter();
        let value = pieces
            .next()
            .ok_or_else(|| Error::Manifest(format!("empty clause in '{text}'")))?;
        let mut attributes = IndexMap::new();
        for piece in pieces {
            let (key, raw) = piece
                .split_once('=')
                .ok_or_else(|| Error::Manifest(format!("malformed attribute '{piece}'")))?;
            attributes.insert(key.trim().to_string(), unquote(raw.trim()));
        }
        Ok(Clause { value, attributes })
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        for (key, value) in &self.attributes {
            write!(f, ";{}={}", key, quote_if_needed(value))?;
        }
        Ok(())
    }
}

fn parse_clause_list(raw: &str) -> Result<Vec<Clause>> {
    split_quoted(raw, ',')
        .iter()
        .map(|text| Clause::parse(text))
        .collect()
}

fn join_clauses(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(Clause::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// `Unit-SymbolicName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicNameHeader {
    pub name: String,
}

impl SymbolicNameHeader {
    pub fn new(name: impl Into<String>) -> SymbolicNameHeader {
        SymbolicNameHeader { name: name.into() }
    }

    pub fn parse(raw: &str) -> Result<SymbolicNameHeader> {
        let clause = Clause::parse(raw)?;
        Ok(SymbolicNameHeader { name: clause.value })
    }
}

/// `Unit-Version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHeader {
    pub version: Version,
}

impl VersionHeader {
    pub fn new(version: Version) -> VersionHeader {
        VersionHeader { version }
    }

    pub fn parse(raw: &str) -> Result<VersionHeader> {
        Ok(VersionHeader {
            version: parse_version(raw.trim())?,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.version == zero_version()
    }
}

/// `Unit-Type`. Defaults to [`types::APPLICATION`] when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeHeader {
    pub value: String,
}

impl TypeHeader {
    pub fn new(value: impl Into<String>) -> TypeHeader {
        TypeHeader {
            value: value.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<TypeHeader> {
        let clause = Clause::parse(raw)?;
        Ok(TypeHeader {
            value: clause.value,
        })
    }

    pub fn is_composite(&self) -> bool {
        self.value == types::COMPOSITE
    }
}

impl Default for TypeHeader {
    fn default() -> TypeHeader {
        TypeHeader::new(types::APPLICATION)
    }
}

/// `Unit-Content`: one clause per member resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeader {
    pub clauses: Vec<Clause>,
}

impl ContentHeader {
    pub fn parse(raw: &str) -> Result<ContentHeader> {
        Ok(ContentHeader {
            clauses: parse_clause_list(raw)?,
        })
    }

    /// Derive a content header from discovered resource identities.
    pub fn from_identities<'a>(
        identities: impl IntoIterator<Item = &'a ResourceIdentity>,
    ) -> ContentHeader {
        let clauses = identities
            .into_iter()
            .map(|identity| {
                Clause::new(identity.name.clone())
                    .with_attribute(attributes::VERSION, identity.version.to_string())
                    .with_attribute(attributes::TYPE, identity.kind.clone())
            })
            .collect();
        ContentHeader { clauses }
    }

    /// Each content clause becomes an identity-namespace requirement seed.
    pub fn to_requirements(&self) -> Vec<Requirement> {
        self.clauses
            .iter()
            .map(|clause| {
                let mut filter = Filter::new().with(attributes::NAME, clause.value.clone());
                if let Some(version) = clause.attribute(attributes::VERSION) {
                    filter = filter.with(attributes::VERSION, version);
                }
                if let Some(kind) = clause.attribute(attributes::TYPE) {
                    filter = filter.with(attributes::TYPE, kind);
                }
                Requirement::new(namespaces::IDENTITY, filter)
            })
            .collect()
    }
}

/// Requirement-carrying headers (`Import-Package`, `Require-Module`,
/// `Require-Capability`) share clause handling and differ only in how a
/// clause maps to a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementHeader {
    pub clauses: Vec<Clause>,
}

impl RequirementHeader {
    pub fn parse(raw: &str) -> Result<RequirementHeader> {
        Ok(RequirementHeader {
            clauses: parse_clause_list(raw)?,
        })
    }

    /// Build a header from requirements whose filters use `primary_key` as
    /// the clause value. Returns `None` when no requirement applies.
    fn from_requirements_keyed(
        requirements: &[Requirement],
        namespace: &str,
        primary_key: &str,
    ) -> Option<RequirementHeader> {
        let clauses: Vec<Clause> = requirements
            .iter()
            .filter(|req| req.namespace() == namespace)
            .map(|req| {
                let mut clause = Clause::new(
                    req.filter()
                        .entries()
                        .get(primary_key)
                        .cloned()
                        .unwrap_or_default(),
                );
                for (key, value) in req.filter().entries() {
                    if key != primary_key {
                        clause = clause.with_attribute(key.clone(), value.clone());
                    }
                }
                clause
            })
            .collect();
        if clauses.is_empty() {
            None
        } else {
            Some(RequirementHeader { clauses })
        }
    }

    fn to_requirements_keyed(&self, namespace: &str, primary_key: &str) -> Vec<Requirement> {
        self.clauses
            .iter()
            .map(|clause| {
                let mut filter = Filter::new().with(primary_key, clause.value.clone());
                for (key, value) in &clause.attributes {
                    filter = filter.with(key.clone(), value.clone());
                }
                Requirement::new(namespace, filter)
            })
            .collect()
    }

    pub fn import_package(requirements: &[Requirement]) -> Option<RequirementHeader> {
        Self::from_requirements_keyed(requirements, namespaces::PACKAGE, namespaces::PACKAGE)
    }

    pub fn require_module(requirements: &[Requirement]) -> Option<RequirementHeader> {
        Self::from_requirements_keyed(requirements, namespaces::MODULE, namespaces::MODULE)
    }

    /// Every requirement outside the reserved `unit.` namespaces becomes a
    /// generic require-capability clause (value = namespace).
    pub fn require_capability(requirements: &[Requirement]) -> Option<RequirementHeader> {
        let clauses: Vec<Clause> = requirements
            .iter()
            .filter(|req| !req.namespace().starts_with(namespaces::RESERVED_PREFIX))
            .map(|req| {
                let mut clause = Clause::new(req.namespace());
                for (key, value) in req.filter().entries() {
                    clause = clause.with_attribute(key.clone(), value.clone());
                }
                clause
            })
            .collect();
        if clauses.is_empty() {
            None
        } else {
            Some(RequirementHeader { clauses })
        }
    }

    pub fn import_package_requirements(&self) -> Vec<Requirement> {
        self.to_requirements_keyed(namespaces::PACKAGE, namespaces::PACKAGE)
    }

    pub fn require_module_requirements(&self) -> Vec<Requirement> {
        self.to_requirements_keyed(namespaces::MODULE, namespaces::MODULE)
    }

    pub fn require_capability_requirements(&self) -> Vec<Requirement> {
        self.clauses
            .iter()
            .map(|clause| {
                let mut filter = Filter::new();
                for (key, value) in &clause.attributes {
                    filter = filter.with(key.clone(), value.clone());
                }
                Requirement::new(clause.value.clone(), filter)
            })
            .collect()
    }
}

/// Free-form header preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericHeader {
    pub name: String,
    pub value: String,
}

/// The closed set of header kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    SymbolicName(SymbolicNameHeader),
    Version(VersionHeader),
    Type(TypeHeader),
    Content(ContentHeader),
    ImportPackage(RequirementHeader),
    RequireModule(RequirementHeader),
    RequireCapability(RequirementHeader),
    DeployedContent(ContentHeader),
    Generic(GenericHeader),
}

impl Header {
    /// Parse a raw header value according to its name.
    pub fn parse(name: &str, raw: &str) -> Result<Header> {
        Ok(match name {
            names::SYMBOLIC_NAME => Header::SymbolicName(SymbolicNameHeader::parse(raw)?),
            names::VERSION => Header::Version(VersionHeader::parse(raw)?),
            names::TYPE => Header::Type(TypeHeader::parse(raw)?),
            names::CONTENT => Header::Content(ContentHeader::parse(raw)?),
            names::IMPORT_PACKAGE => Header::ImportPackage(RequirementHeader::parse(raw)?),
            names::REQUIRE_MODULE => Header::RequireModule(RequirementHeader::parse(raw)?),
            names::REQUIRE_CAPABILITY => {
                Header::RequireCapability(RequirementHeader::parse(raw)?)
            }
            names::DEPLOYED_CONTENT => Header::DeployedContent(ContentHeader::parse(raw)?),
            _ => Header::Generic(GenericHeader {
                name: name.to_string(),
                value: raw.trim().to_string(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Header::SymbolicName(_) => names::SYMBOLIC_NAME,
            Header::Version(_) => names::VERSION,
            Header::Type(_) => names::TYPE,
            Header::Content(_) => names::CONTENT,
            Header::ImportPackage(_) => names::IMPORT_PACKAGE,
            Header::RequireModule(_) => names::REQUIRE_MODULE,
            Header::RequireCapability(_) => names::REQUIRE_CAPABILITY,
            Header::DeployedContent(_) => names::DEPLOYED_CONTENT,
            Header::Generic(generic) => &generic.name,
        }
    }

    /// Serialize the header value back to raw clause text.
    pub fn value(&self) -> String {
        match self {
            Header::SymbolicName(header) => header.name.clone(),
            Header::Version(header) => header.version.to_string(),
            Header::Type(header) => header.value.clone(),
            Header::Content(header) | Header::DeployedContent(header) => {
                join_clauses(&header.clauses)
            }
            Header::ImportPackage(header)
            | Header::RequireModule(header)
            | Header::RequireCapability(header) => join_clauses(&header.clauses),
            Header::Generic(generic) => generic.value.clone(),
        }
    }
}
