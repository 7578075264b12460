//! Unit location parsing
//!
//! A location identifier either matches the unit archive name grammar
//! `name[@version].esa`, yielding a derivable symbolic name and version,
//! or it is treated as an opaque addressable location whose name and
//! version must come from elsewhere (manifest or generated default).

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use crate::error::{Error, Result};

static PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^@]+)(?:@(.+))?\.esa$").unwrap());

/// A parsed unit location. Immutable; derived once from the input identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    raw: String,
    name: Option<String>,
    version: Option<Version>,
}

impl Location {
    /// Parse an identifier string. Never fails: identifiers outside the
    /// archive-name grammar become opaque locations.
    pub fn parse(identifier: &str) -> Location {
        match PATTERN.captures(identifier) {
            Some(captures) => {
                let name = captures.get(1).map(|m| m.as_str().to_string());
                let version = captures
                    .get(2)
                    .and_then(|m| parse_version(m.as_str()).ok());
                Location {
                    raw: identifier.to_string(),
                    name,
                    version,
                }
            }
            None => Location {
                raw: identifier.to_string(),
                name: None,
                version: None,
            },
        }
    }

    /// The raw identifier as given.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Symbolic name derived from the identifier, if the grammar matched.
    pub fn symbolic_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Version derived from the identifier, if present.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Open the identifier as a readable byte source. The raw identifier is
    /// dereferenced as a filesystem path.
    pub fn open(&self) -> Result<Box<dyn Read>> {
        let file =
            File::open(&self.raw).map_err(|_| Error::InvalidLocation(self.raw.clone()))?;
        Ok(Box::new(file))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.version) {
            (Some(name), Some(version)) => write!(f, "{}@{}", name, version),
            (Some(name), None) => write!(f, "{}", name),
            _ => write!(f, "{}", self.raw),
        }
    }
}

/// Parse a version token leniently: missing minor/patch components pad
/// with zero, so `1.2` parses as `1.2.0`.
pub fn parse_version(token: &str) -> Result<Version> {
    if let Ok(version) = Version::parse(token) {
        return Ok(version);
    }
    let (numbers, pre) = match token.split_once('-') {
        Some((n, p)) => (n, Some(p)),
        None => (token, None),
    };
    let mut parts = [0u64; 3];
    let mut count = 0;
    for piece in numbers.split('.') {
        if count == 3 {
            return Err(Error::Manifest(format!("invalid version token '{token}'")));
        }
        parts[count] = piece
            .parse()
            .map_err(|_| Error::Manifest(format!("invalid version token '{token}'")))?;
        count += 1;
    }
    if count == 0 {
        return Err(Error::Manifest(format!("invalid version token '{token}'")));
    }
    let mut version = Version::new(parts[0], parts[1], parts[2]);
    if let Some(pre) = pre {
        version.pre = semver::Prerelease::new(pre)
            .map_err(|_| Error::Manifest(format!("invalid version token '{token}'")))?;
    }
    Ok(version)
}

/// The zero version, used as the "absent" marker in version headers.
pub fn zero_version() -> Version {
    Version::new(0, 0, 0)
}
