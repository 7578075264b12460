//! Transitive dependency-closure computation
//!
//! Given seed resources (the chosen providers for a unit's top-level
//! requirements), compute the seeds plus every resource transitively
//! required to satisfy the seeds' own requirements, breadth-first and
//! cycle-safe, against the same composite repository that picked the seeds.
//!
//! Provider selection is greedy: the strategy sees every candidate but the
//! default takes the first, and no backtracking ever happens. Requirements
//! with no provider are recorded and skipped, never errors; callers that
//! want a mandatory unsatisfied requirement to fail can inspect
//! [`Closure::unsatisfied`].

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::Result;
use crate::repository::Repository;
use crate::resource::{Capability, Requirement, Resource, ResourceIdentity};

/// Picks the authoritative provider among the candidates for one
/// requirement. Pluggable so a real constraint solver can replace the
/// greedy default without touching the traversal.
pub trait ProviderStrategy: Send + Sync {
    fn choose<'a>(&self, providers: &'a [Capability]) -> Option<&'a Capability>;
}

/// The greedy default: the first capability returned is authoritative.
pub struct FirstFit;

impl ProviderStrategy for FirstFit {
    fn choose<'a>(&self, providers: &'a [Capability]) -> Option<&'a Capability> {
        providers.first()
    }
}

/// Result of a closure computation.
pub struct Closure {
    /// Seeds plus transitively required resources, in discovery (BFS)
    /// order — not topological order.
    pub resources: Vec<Arc<dyn Resource>>,
    /// Requirements of closure members that no repository capability
    /// satisfies, deduplicated by namespace and filter.
    pub unsatisfied: Vec<Requirement>,
}

/// Compute the dependency closure of `seeds` against `repository`.
///
/// Terminates because the visited set only grows and the universe of
/// resources is finite. The result never contains two resources with the
/// same identity.
pub fn resolve(
    seeds: Vec<Arc<dyn Resource>>,
    repository: &dyn Repository,
    strategy: &dyn ProviderStrategy,
) -> Result<Closure> {
    let mut visited: HashSet<ResourceIdentity> = HashSet::new();
    let mut queue: VecDeque<Arc<dyn Resource>> = VecDeque::new();
    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();
    let mut unsatisfied: Vec<Requirement> = Vec::new();

    for seed in seeds {
        if visited.insert(seed.identity().clone()) {
            resources.push(seed.clone());
            queue.push_back(seed);
        }
    }

    while let Some(resource) = queue.pop_front() {
        trace!(resource = %resource.identity(), "expanding requirements");
        for requirement in resource.requirements(None) {
            let providers = repository.find_providers(&requirement)?;
            let Some(capability) = strategy.choose(&providers) else {
                debug!(
                    namespace = requirement.namespace(),
                    filter = %requirement.filter(),
                    optional = requirement.is_optional(),
                    "requirement has no provider, skipping"
                );
                let duplicate = unsatisfied.iter().any(|existing| {
                    existing.namespace() == requirement.namespace()
                        && existing.filter() == requirement.filter()
                });
                if !duplicate {
                    unsatisfied.push(requirement);
                }
                continue;
            };
            let Some(provider) = capability.owner() else {
                // A capability whose resource is gone cannot satisfy
                // anything; treat as unsatisfied.
                debug!(
                    namespace = requirement.namespace(),
                    "provider resource no longer alive, skipping"
                );
                continue;
            };
            if visited.insert(provider.identity().clone()) {
                trace!(provider = %provider.identity(), "joined closure");
                resources.push(provider.clone());
                queue.push_back(provider);
            }
        }
    }

    Ok(Closure {
        resources,
        unsatisfied,
    })
}
