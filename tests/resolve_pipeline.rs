//! End-to-end resolution pipeline tests
//!
//! These build real tar-container unit archives and run them through the
//! full orchestrator: expansion, resource-graph construction, repository
//! matching, closure computation, and manifest synthesis.

mod common;

use std::fs;
use std::io::Cursor;
use std::io::Read;
use std::sync::Arc;

use semver::Version;
use unitres::closure::FirstFit;
use unitres::error::Error;
use unitres::manifest::header::names;
use unitres::repository::{IndexRepository, Repository};
use unitres::resource::{attributes, namespaces, types, Capability, Requirement, Resource};
use unitres::{ResolverContext, UnitResource};

fn resolve_bytes(
    identifier: &str,
    bytes: Vec<u8>,
    context: &ResolverContext,
) -> unitres::Result<Arc<UnitResource>> {
    let content: Box<dyn Read> = Box::new(Cursor::new(bytes));
    UnitResource::resolve(identifier, Some(content), context)
}

/// A repository that fails the test if resolution ever consults it.
struct PanicRepository;

impl Repository for PanicRepository {
    fn find_providers(&self, requirement: &Requirement) -> unitres::Result<Vec<Capability>> {
        panic!(
            "composite-type unit must not resolve requirements, got lookup for '{}'",
            requirement.namespace()
        );
    }
}

#[test]
fn test_default_synthesis_for_bare_archive() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work"));
    let archive = common::tar_archive(&[("bar.jar", b"module bytes")]);

    let unit = resolve_bytes("foo@1.2.0.esa", archive, &context).unwrap();

    assert_eq!(unit.location().symbolic_name(), Some("foo"));
    assert_eq!(unit.location().version(), Some(&Version::new(1, 2, 0)));

    assert_eq!(unit.resources().len(), 1);
    assert_eq!(unit.resources()[0].identity().name, "bar");
    assert_eq!(unit.resources()[0].identity().kind, types::MODULE);

    let manifest = unit.manifest();
    assert_eq!(manifest.symbolic_name().unwrap().name, "foo");
    assert_eq!(manifest.version().unwrap().version, Version::new(1, 2, 0));
    assert_eq!(
        manifest.content().unwrap().clauses[0].value,
        "bar",
        "content header lists the discovered module"
    );
    assert!(manifest.header(names::IMPORT_PACKAGE).is_none());
    assert!(manifest.header(names::REQUIRE_MODULE).is_none());
    assert!(manifest.header(names::REQUIRE_CAPABILITY).is_none());

    // Identity capability follows the finalized manifest.
    let caps = unit.capabilities(Some(namespaces::IDENTITY));
    assert_eq!(caps.len(), 1);
    assert_eq!(caps[0].attribute(attributes::NAME), Some("foo"));
    assert_eq!(caps[0].attribute(attributes::VERSION), Some("1.2.0"));
}

#[test]
fn test_resolution_is_deterministic() {
    let temp = common::create_temp_dir();
    let archive = common::tar_archive(&[
        ("b.jar", b"b".as_slice()),
        ("a.jar", b"a".as_slice()),
        (
            "UNIT-INF/UNIT.MF",
            b"Unit-SymbolicName: demo\n".as_slice(),
        ),
    ]);

    let first_context = ResolverContext::new(temp.path().join("one"));
    let second_context = ResolverContext::new(temp.path().join("two"));
    let first = resolve_bytes("demo@1.0.0.esa", archive.clone(), &first_context).unwrap();
    let second = resolve_bytes("demo@1.0.0.esa", archive, &second_context).unwrap();

    assert_eq!(first.manifest().to_string(), second.manifest().to_string());
    let first_order: Vec<String> = first
        .resources()
        .iter()
        .map(|r| r.identity().name.clone())
        .collect();
    let second_order: Vec<String> = second
        .resources()
        .iter()
        .map(|r| r.identity().name.clone())
        .collect();
    assert_eq!(first_order, second_order);
    assert_eq!(first_order, vec!["a", "b"]);
}

#[test]
fn test_existing_headers_win_over_location() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work"));
    let archive = common::tar_archive(&[(
        "UNIT-INF/UNIT.MF",
        b"Unit-SymbolicName: declared\nUnit-Version: 3.1.0\n".as_slice(),
    )]);

    let unit = resolve_bytes("foo@1.2.0.esa", archive, &context).unwrap();
    assert_eq!(unit.manifest().symbolic_name().unwrap().name, "declared");
    assert_eq!(
        unit.manifest().version().unwrap().version,
        Version::new(3, 1, 0)
    );
}

#[test]
fn test_composite_type_unit_is_exempt_from_resolution() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work"))
        .with_external(Arc::new(PanicRepository));
    let manifest_text = "Unit-SymbolicName: assembly\n\
         Unit-Type: unit.composite\n\
         Import-Package: com.example.api;version=1.0.0\n\
         Require-Capability: vendor.feature;flag=on\n";
    let archive = common::tar_archive(&[
        ("member.jar", b"member".as_slice()),
        ("UNIT-INF/UNIT.MF", manifest_text.as_bytes()),
    ]);

    let unit = resolve_bytes("assembly@1.0.0.esa", archive, &context).unwrap();

    // Declared requirement headers survive verbatim; nothing synthesized.
    assert_eq!(
        unit.manifest().header(names::IMPORT_PACKAGE).unwrap().value(),
        "com.example.api;version=1.0.0"
    );
    assert_eq!(
        unit.manifest()
            .header(names::REQUIRE_CAPABILITY)
            .unwrap()
            .value(),
        "vendor.feature;flag=on"
    );

    // Requirements come straight from the declared headers.
    let package_reqs = unit.requirements(Some(namespaces::PACKAGE));
    assert_eq!(package_reqs.len(), 1);
    let feature_reqs = unit.requirements(Some("vendor.feature"));
    assert_eq!(feature_reqs.len(), 1);
}

#[test]
fn test_nested_unit_recursion() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work"));

    let inner = common::tar_archive(&[("baz.jar", b"baz".as_slice())]);
    let outer = common::tar_archive(&[
        ("bar.jar", b"bar".as_slice()),
        ("inner@1.0.0.esa", inner.as_slice()),
    ]);

    let unit = resolve_bytes("outer@2.0.0.esa", outer, &context).unwrap();
    assert_eq!(unit.resources().len(), 2);

    let nested = unit
        .resources()
        .iter()
        .find(|resource| resource.identity().name == "inner")
        .expect("nested unit resource");
    assert_eq!(nested.identity().version, Version::new(1, 0, 0));
    assert_eq!(nested.identity().kind, types::APPLICATION);

    // Nested unit and parent got distinct ids and working directories.
    assert_ne!(unit.id(), 0);
    let work_entries = fs::read_dir(temp.path().join("work")).unwrap().count();
    assert_eq!(work_entries, 2);
}

#[test]
fn test_nesting_depth_limit_is_enforced() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work")).with_max_depth(0);

    let inner = common::tar_archive(&[("baz.jar", b"baz".as_slice())]);
    let outer = common::tar_archive(&[("inner@1.0.0.esa", inner.as_slice())]);

    let result = resolve_bytes("outer@1.0.0.esa", outer, &context);
    assert!(matches!(result, Err(Error::DepthExceeded(0))));
}

#[test]
fn test_working_directory_collision_is_fatal() {
    let temp = common::create_temp_dir();
    let work_root = temp.path().join("work");
    // The first construction from a fresh context gets id 1; occupy it.
    fs::create_dir_all(work_root.join("1")).unwrap();

    let context = ResolverContext::new(&work_root);
    let archive = common::tar_archive(&[("bar.jar", b"bar".as_slice())]);
    let result = resolve_bytes("foo@1.0.0.esa", archive, &context);
    assert!(matches!(result, Err(Error::DirectoryCollision(_))));
}

#[test]
fn test_external_provider_requirements_bubble_up() {
    let temp = common::create_temp_dir();
    let index = IndexRepository::parse(
        r#"
        [[resources]]
        name = "helper"
        version = "1.0.0"
        [[resources.requirements]]
        namespace = "unit.wiring.package"
        [resources.requirements.filter]
        "unit.wiring.package" = "com.example.api"
        "#,
    )
    .unwrap();
    let context = ResolverContext::new(temp.path().join("work"))
        .with_external(Arc::new(index))
        .with_strategy(Arc::new(FirstFit));

    // Content declares a member that only the external index provides;
    // that member's own package requirement has no provider anywhere, so
    // it becomes the unit's synthesized Import-Package header.
    let archive = common::tar_archive(&[(
        "UNIT-INF/UNIT.MF",
        b"Unit-SymbolicName: app\nUnit-Content: helper\n".as_slice(),
    )]);

    let unit = resolve_bytes("app@1.0.0.esa", archive, &context).unwrap();

    assert_eq!(
        unit.manifest().header(names::IMPORT_PACKAGE).unwrap().value(),
        "com.example.api"
    );
    let reqs = unit.requirements(Some(namespaces::PACKAGE));
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].namespace(), namespaces::PACKAGE);
    // The finalized unit owns its requirements.
    let owner = reqs[0].owner().expect("requirement owner");
    assert_eq!(owner.identity().name, "app");
}

#[test]
fn test_corrupt_archive_is_an_io_failure() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work"));

    let result = resolve_bytes("foo@1.0.0.esa", b"not a tar archive".to_vec(), &context);
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_content_entry_without_provider_is_skipped() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work"));
    let archive = common::tar_archive(&[(
        "UNIT-INF/UNIT.MF",
        b"Unit-SymbolicName: app\nUnit-Content: ghost\n".as_slice(),
    )]);

    // An unsatisfiable content entry is silently dropped, not an error.
    let unit = resolve_bytes("app@1.0.0.esa", archive, &context).unwrap();
    assert!(unit.manifest().header(names::IMPORT_PACKAGE).is_none());
    assert!(unit.requirements(None).is_empty());
}

#[test]
fn test_deployment_manifest_is_loaded_when_present() {
    let temp = common::create_temp_dir();
    let context = ResolverContext::new(temp.path().join("work"));
    let archive = common::tar_archive(&[
        ("bar.jar", b"bar".as_slice()),
        (
            "UNIT-INF/DEPLOYMENT.MF",
            b"Deployed-Content: bar;version=0.0.0\n".as_slice(),
        ),
    ]);

    let unit = resolve_bytes("foo@1.0.0.esa", archive, &context).unwrap();
    let deployment = unit.deployment_manifest().expect("deployment manifest");
    assert_eq!(deployment.deployed_content().unwrap().clauses[0].value, "bar");

    let without = common::tar_archive(&[("bar.jar", b"bar".as_slice())]);
    let unit = resolve_bytes("plain@1.0.0.esa", without, &context).unwrap();
    assert!(unit.deployment_manifest().is_none());
}

#[test]
fn test_content_satisfied_locally_beats_external() {
    let temp = common::create_temp_dir();
    // External index offers a same-named module with a requirement that
    // would bubble up; the local module must win by member order.
    let index = IndexRepository::parse(
        r#"
        [[resources]]
        name = "bar"
        version = "0.0.0"
        [[resources.requirements]]
        namespace = "unit.wiring.package"
        [resources.requirements.filter]
        "unit.wiring.package" = "com.example.api"
        "#,
    )
    .unwrap();
    let context =
        ResolverContext::new(temp.path().join("work")).with_external(Arc::new(index));
    let archive = common::tar_archive(&[("bar.jar", b"bar".as_slice())]);

    let unit = resolve_bytes("foo@1.0.0.esa", archive, &context).unwrap();
    // Had the external provider been chosen, Import-Package would appear.
    assert!(unit.manifest().header(names::IMPORT_PACKAGE).is_none());
    assert!(unit.requirements(None).is_empty());
}
