//! End-to-end `spindle install` runs against the bundled offline manifest
//! fixture, driven through `assert_cmd` as a binary-level integration suite.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::str::contains;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn spindle() -> Command {
    Command::cargo_bin("spindle").expect("spindle binary built")
}

#[test]
fn installs_a_leaf_package_with_no_dependencies() {
    spindle()
        .arg("install")
        .arg("--registry")
        .arg(fixture("registry.toml"))
        .arg("--quiet")
        .arg("curdling")
        .assert()
        .success();
}

#[test]
fn builds_a_shared_transitive_dependency_once() {
    spindle()
        .arg("install")
        .arg("--registry")
        .arg(fixture("registry.toml"))
        .arg("sure")
        .arg("mock")
        .assert()
        .success()
        .stderr(contains("Built 3 package(s)"));
}

#[test]
fn conflicting_pins_on_the_same_package_are_reported_and_exit_nonzero() {
    spindle()
        .arg("install")
        .arg("--registry")
        .arg(fixture("registry.toml"))
        .arg("forbiddenfruit (== 0.1.1)")
        .arg("forbiddenfruit (== 0.2.0)")
        .assert()
        .failure()
        .stderr(contains("no version of forbiddenfruit satisfies"));
}

#[test]
fn a_requirement_with_no_matching_package_fails_with_a_grouped_report() {
    spindle()
        .arg("install")
        .arg("--registry")
        .arg(fixture("registry.toml"))
        .arg("does-not-exist")
        .assert()
        .failure()
        .stderr(contains("does-not-exist"));
}

#[test]
fn running_with_no_requirements_is_a_usage_error() {
    spindle()
        .arg("install")
        .arg("--registry")
        .arg(fixture("registry.toml"))
        .assert()
        .failure()
        .stderr(contains("no requirements given"));
}
