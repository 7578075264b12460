//! Error taxonomy for unit resolution
//!
//! Every failure in the pipeline maps onto one of these variants and
//! propagates to the caller; nothing in this crate recovers or retries
//! locally. Nested-unit failures abort the parent expansion too.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The identifier could not be parsed or dereferenced as a readable source.
    #[error("invalid location '{0}'")]
    InvalidLocation(String),

    /// Archive copy, extraction, or manifest read failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally invalid manifest content.
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// Working-directory creation collided with an existing path. This
    /// indicates a counter or filesystem-state bug and is never retried.
    #[error("working directory already exists: {0}")]
    DirectoryCollision(PathBuf),

    /// An underlying repository lookup failed during closure computation.
    /// Unsatisfied-but-optional requirements are not errors.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Nested-archive recursion exceeded the configured depth limit.
    #[error("archive nesting exceeds maximum depth of {0}")]
    DepthExceeded(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
