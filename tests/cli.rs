//! Integration tests for the command-line interface
//!
//! These tests run the built binary against real archive files and check
//! the printed manifest and JSON output.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("unitres").unwrap()
}

#[test]
fn test_resolve_help() {
    cmd()
        .args(["resolve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--index"))
        .stdout(predicate::str::contains("--workdir"))
        .stdout(predicate::str::contains("--max-depth"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_resolve_requires_location() {
    cmd()
        .args(["resolve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_resolve_prints_finalized_manifest() {
    let temp = common::create_temp_dir();
    let archive = common::write_archive(
        &temp,
        "foo@1.2.0.esa",
        &[("bar.jar", b"module bytes".as_slice())],
    );

    cmd()
        .arg("resolve")
        .arg(&archive)
        .arg("--workdir")
        .arg(temp.path().join("work"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Unit-SymbolicName: foo"))
        .stdout(predicate::str::contains("Unit-Version: 1.2.0"))
        .stdout(predicate::str::contains("Unit-Content: bar"));
}

#[test]
fn test_resolve_json_output() {
    let temp = common::create_temp_dir();
    let archive = common::write_archive(
        &temp,
        "foo@1.2.0.esa",
        &[("bar.jar", b"module bytes".as_slice())],
    );

    let output = cmd()
        .arg("resolve")
        .arg(&archive)
        .arg("--workdir")
        .arg(temp.path().join("work"))
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["manifest"]["Unit-SymbolicName"], "foo");
    assert_eq!(parsed["manifest"]["Unit-Version"], "1.2.0");
    assert_eq!(parsed["resources"][0], "bar@0.0.0");
}

#[test]
fn test_resolve_with_index_synthesizes_imports() {
    let temp = common::create_temp_dir();
    let index_path = temp.path().join("index.toml");
    std::fs::write(
        &index_path,
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
    let archive = common::write_archive(
        &temp,
        "app@1.0.0.esa",
        &[(
            "UNIT-INF/UNIT.MF",
            b"Unit-SymbolicName: app\nUnit-Content: helper\n".as_slice(),
        )],
    );

    cmd()
        .arg("resolve")
        .arg(&archive)
        .arg("--workdir")
        .arg(temp.path().join("work"))
        .arg("--index")
        .arg(&index_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Import-Package: com.example.api"));
}

#[test]
fn test_resolve_missing_archive_fails() {
    let temp = common::create_temp_dir();
    cmd()
        .arg("resolve")
        .arg("no-such-unit@1.0.0.esa")
        .arg("--workdir")
        .arg(temp.path().join("work"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-unit"));
}

#[test]
fn test_resolve_max_depth_rejects_nesting() {
    let temp = common::create_temp_dir();
    let inner = common::tar_archive(&[("baz.jar", b"baz".as_slice())]);
    let archive = common::write_archive(
        &temp,
        "outer@1.0.0.esa",
        &[("inner@1.0.0.esa", inner.as_slice())],
    );

    cmd()
        .arg("resolve")
        .arg(&archive)
        .arg("--workdir")
        .arg(temp.path().join("work"))
        .arg("--max-depth")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("depth"));
}
