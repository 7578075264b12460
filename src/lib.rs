//! unitres — resolver for self-describing deployable unit archives
//!
//! A unit archive (`.esa`) bundles leaf module archives and nested unit
//! archives. Resolution expands the archive into a resource graph, matches
//! capabilities against requirements across composed repositories, computes
//! the transitive dependency closure, and synthesizes a canonical manifest
//! where declared headers win over computed ones. The entry point is
//! [`unit::UnitResource::resolve`] with a [`context::ResolverContext`].

pub mod archive;
pub mod closure;
pub mod context;
pub mod error;
pub mod location;
pub mod logging;
pub mod manifest;
pub mod repository;
pub mod resource;
pub mod unit;

pub use context::ResolverContext;
pub use error::{Error, Result};
pub use location::Location;
pub use unit::UnitResource;
