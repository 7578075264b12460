//! Unit resolution orchestrator
//!
//! [`UnitResource::resolve`] runs the whole pipeline for one archive:
//! working-directory allocation, archive copy and expansion, resource-graph
//! construction (recursing into nested unit archives), local repository,
//! manifest synthesis around requirement resolution, capability derivation,
//! and deployment-manifest loading. Each step either succeeds or aborts the
//! whole construction; no partial unit is ever returned. The resulting
//! object is immutable.

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use tracing::{debug, info};

use crate::archive::{
    Directory, DEPLOYMENT_MANIFEST_PATH, MODULE_EXTENSION, UNIT_EXTENSION, UNIT_MANIFEST_PATH,
};
use crate::closure;
use crate::context::ResolverContext;
use crate::error::{Error, Result};
use crate::location::{zero_version, Location};
use crate::manifest::header::{
    ContentHeader, Header, RequirementHeader, SymbolicNameHeader, VersionHeader,
};
use crate::manifest::{DeploymentManifest, Manifest, ManifestBuilder};
use crate::repository::{CompositeRepository, LocalRepository, Repository};
use crate::resource::{Capability, ModuleResource, Requirement, Resource, ResourceIdentity};

/// A fully resolved unit: the produced-object contract of the pipeline.
pub struct UnitResource {
    id: u64,
    location: Location,
    directory: PathBuf,
    identity: ResourceIdentity,
    manifest: Manifest,
    deployment_manifest: Option<DeploymentManifest>,
    resources: Vec<Arc<dyn Resource>>,
    local_repository: Arc<LocalRepository>,
    capabilities: Vec<Capability>,
    requirements: Vec<Requirement>,
}

impl UnitResource {
    /// Resolve the archive at `location`. When `content` is `None` the
    /// location itself is opened as the byte source.
    pub fn resolve(
        location: &str,
        content: Option<Box<dyn Read>>,
        context: &ResolverContext,
    ) -> Result<Arc<UnitResource>> {
        resolve_at_depth(location, content, context, 0)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The unit's working directory; it outlives construction and is the
    /// caller's to clean up.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn deployment_manifest(&self) -> Option<&DeploymentManifest> {
        self.deployment_manifest.as_ref()
    }

    /// Repository view over the unit's directly discovered resources.
    pub fn local_repository(&self) -> &Arc<LocalRepository> {
        &self.local_repository
    }

    /// Child resources discovered by expanding the archive, in listing
    /// order, duplicates preserved.
    pub fn resources(&self) -> &[Arc<dyn Resource>] {
        &self.resources
    }
}

impl Resource for UnitResource {
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

fn resolve_at_depth(
    location: &str,
    content: Option<Box<dyn Read>>,
    context: &ResolverContext,
    depth: usize,
) -> Result<Arc<UnitResource>> {
    if depth > context.max_depth() {
        return Err(Error::DepthExceeded(context.max_depth()));
    }

    let location = Location::parse(location);
    let mut content = match content {
        Some(content) => content,
        None => location.open()?,
    };

    let id = context.next_id();
    info!(location = location.raw(), id, depth, "resolving unit");

    let directory = create_working_directory(context, id)?;
    let archive_file = copy_archive(&mut content, &directory, id)?;
    let expanded = context.opener().open(&archive_file, &directory)?;

    let resources = compute_resources(expanded.as_ref(), context, depth)?;
    let local_repository = Arc::new(LocalRepository::new(resources.clone()));

    let manifest = compute_existing_manifest(expanded.as_ref())?.unwrap_or_default();
    let manifest = compute_manifest_before_requirements(manifest, &location, &resources, id);
    let requirements =
        compute_requirements(&manifest, local_repository.clone(), context)?;
    let manifest = compute_manifest_after_requirements(manifest, &requirements);
    let deployment_manifest = compute_deployment_manifest(expanded.as_ref())?;

    let identity = manifest
        .identity()
        .ok_or_else(|| Error::Manifest("finalized manifest has no symbolic name".to_string()))?;

    debug!(identity = %identity, requirements = requirements.len(), "unit resolved");

    Ok(Arc::new_cyclic(|me: &Weak<UnitResource>| {
        let owner: Weak<dyn Resource> = me.clone();
        let capabilities = manifest.to_capabilities(owner.clone());
        let mut requirements = requirements;
        for requirement in &mut requirements {
            requirement.attach_owner(owner.clone());
        }
        UnitResource {
            id,
            location,
            directory,
            identity,
            manifest,
            deployment_manifest,
            resources,
            local_repository,
            capabilities,
            requirements,
        }
    }))
}

/// Allocate the identifier-named working directory. A collision means the
/// counter or filesystem state is corrupt and is fatal, never retried.
fn create_working_directory(context: &ResolverContext, id: u64) -> Result<PathBuf> {
    fs::create_dir_all(context.work_root())?;
    let directory = context.work_root().join(id.to_string());
    match fs::create_dir(&directory) {
        Ok(()) => Ok(directory),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(Error::DirectoryCollision(directory))
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy the raw archive bytes into `<id>.esa` inside the working directory.
fn copy_archive(content: &mut dyn Read, directory: &Path, id: u64) -> Result<PathBuf> {
    let archive_file = directory.join(format!("{id}{UNIT_EXTENSION}"));
    let mut file = fs::File::create(&archive_file)?;
    io::copy(content, &mut file)?;
    Ok(archive_file)
}

/// Scan the expanded directory: module archives become leaf resources,
/// nested unit archives recurse through the whole pipeline, everything
/// else is ignored. Duplicates are preserved.
fn compute_resources(
    directory: &dyn Directory,
    context: &ResolverContext,
    depth: usize,
) -> Result<Vec<Arc<dyn Resource>>> {
    let mut resources: Vec<Arc<dyn Resource>> = Vec::new();
    for name in directory.list()? {
        if name.ends_with(MODULE_EXTENSION) {
            let location = directory
                .locate(&name)
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| name.clone());
            resources.push(ModuleResource::from_entry(&name, location));
        } else if name.ends_with(UNIT_EXTENSION) {
            let bytes = directory.read(&name)?.ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("listed entry '{name}' is not readable"),
                ))
            })?;
            let nested = resolve_at_depth(
                &name,
                Some(Box::new(Cursor::new(bytes))),
                context,
                depth + 1,
            )?;
            resources.push(nested);
        }
    }
    Ok(resources)
}

fn compute_existing_manifest(directory: &dyn Directory) -> Result<Option<Manifest>> {
    read_manifest_text(directory, UNIT_MANIFEST_PATH)?
        .map(|text| Manifest::parse(&text))
        .transpose()
}

fn compute_deployment_manifest(directory: &dyn Directory) -> Result<Option<DeploymentManifest>> {
    read_manifest_text(directory, DEPLOYMENT_MANIFEST_PATH)?
        .map(|text| DeploymentManifest::parse(&text))
        .transpose()
}

fn read_manifest_text(directory: &dyn Directory, path: &str) -> Result<Option<String>> {
    match directory.read(path)? {
        Some(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| Error::Manifest(format!("{path} is not valid UTF-8"))),
        None => Ok(None),
    }
}

/// Phase A: symbolic-name, version, and content headers. Existing headers
/// win; defaults come from the location and the discovered resource graph.
fn compute_manifest_before_requirements(
    manifest: Manifest,
    location: &Location,
    resources: &[Arc<dyn Resource>],
    id: u64,
) -> Manifest {
    let symbolic_name = match manifest.symbolic_name() {
        Some(header) => header.clone(),
        None => match location.symbolic_name() {
            Some(name) => SymbolicNameHeader::new(name),
            None => SymbolicNameHeader::new(format!("unit.{id}")),
        },
    };

    let version = match manifest.version() {
        Some(header) if !header.is_zero() => header.clone(),
        _ => VersionHeader::new(
            location.version().cloned().unwrap_or_else(zero_version),
        ),
    };

    let mut builder = ManifestBuilder::new()
        .manifest(&manifest)
        .header(Header::SymbolicName(symbolic_name))
        .header(Header::Version(version));

    if manifest.content().is_none() && !resources.is_empty() {
        let identities: Vec<ResourceIdentity> = resources
            .iter()
            .map(|resource| resource.identity().clone())
            .collect();
        builder = builder.header(Header::Content(ContentHeader::from_identities(
            identities.iter(),
        )));
    }

    builder.build()
}

/// Derive the unit's own requirement list. Composite units keep their
/// declared requirement headers verbatim and never resolve; everything
/// else seeds the closure resolver from the content header and keeps the
/// closure's unsatisfied requirements.
fn compute_requirements(
    manifest: &Manifest,
    local_repository: Arc<LocalRepository>,
    context: &ResolverContext,
) -> Result<Vec<Requirement>> {
    if manifest.is_composite() {
        return Ok(manifest.to_requirements());
    }
    let Some(content) = manifest.content() else {
        return Ok(Vec::new());
    };

    let local: Arc<dyn Repository> = local_repository;
    let composite = CompositeRepository::new(vec![local, context.external().clone()]);

    let mut seeds: Vec<Arc<dyn Resource>> = Vec::new();
    for requirement in content.to_requirements() {
        let providers = composite.find_providers(&requirement)?;
        match context.strategy().choose(&providers).and_then(Capability::owner) {
            Some(provider) => seeds.push(provider),
            None => debug!(
                namespace = requirement.namespace(),
                filter = %requirement.filter(),
                "content entry has no provider, skipping"
            ),
        }
    }

    let closure = closure::resolve(seeds, &composite, context.strategy())?;
    Ok(closure.unsatisfied)
}

/// Phase B: partition the unsatisfied requirement list into import-package,
/// require-module, and require-capability headers. Composite units are
/// exempt.
fn compute_manifest_after_requirements(
    manifest: Manifest,
    requirements: &[Requirement],
) -> Manifest {
    if manifest.is_composite() {
        return manifest;
    }
    let mut builder = ManifestBuilder::new().manifest(&manifest);
    if let Some(header) = RequirementHeader::import_package(requirements) {
        builder = builder.header(Header::ImportPackage(header));
    }
    if let Some(header) = RequirementHeader::require_module(requirements) {
        builder = builder.header(Header::RequireModule(header));
    }
    if let Some(header) = RequirementHeader::require_capability(requirements) {
        builder = builder.header(Header::RequireCapability(header));
    }
    builder.build()
}
