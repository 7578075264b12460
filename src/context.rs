//! Resolution context
//!
//! Explicit dependency injection for everything a unit construction needs
//! beyond the archive itself: the process-wide identifier counter, the
//! working-storage root, the external provider repository, the archive
//! opener, the provider-selection strategy, and the nesting-depth limit.
//! One context is shared by all constructions, including recursive ones.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::archive::{ArchiveOpener, TarOpener};
use crate::closure::{FirstFit, ProviderStrategy};
use crate::repository::{EmptyRepository, Repository};

/// Default bound on nested-archive recursion.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Process-wide monotonic identifier source. Safe under concurrent use;
/// no two calls observe the same value.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> IdGenerator {
        IdGenerator {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Shared collaborators for unit resolution.
pub struct ResolverContext {
    ids: IdGenerator,
    work_root: PathBuf,
    external: Arc<dyn Repository>,
    opener: Arc<dyn ArchiveOpener>,
    strategy: Arc<dyn ProviderStrategy>,
    max_depth: usize,
}

impl ResolverContext {
    /// A context with defaults: no external repository, tar container
    /// opener, greedy first-fit provider selection, default depth limit.
    pub fn new(work_root: impl Into<PathBuf>) -> ResolverContext {
        ResolverContext {
            ids: IdGenerator::new(),
            work_root: work_root.into(),
            external: Arc::new(EmptyRepository),
            opener: Arc::new(TarOpener),
            strategy: Arc::new(FirstFit),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_external(mut self, external: Arc<dyn Repository>) -> ResolverContext {
        self.external = external;
        self
    }

    pub fn with_opener(mut self, opener: Arc<dyn ArchiveOpener>) -> ResolverContext {
        self.opener = opener;
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> ResolverContext {
        self.strategy = strategy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> ResolverContext {
        self.max_depth = max_depth;
        self
    }

    pub fn next_id(&self) -> u64 {
        self.ids.next_id()
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn external(&self) -> &Arc<dyn Repository> {
        &self.external
    }

    pub fn opener(&self) -> &Arc<dyn ArchiveOpener> {
        &self.opener
    }

    pub fn strategy(&self) -> &dyn ProviderStrategy {
        self.strategy.as_ref()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
