//! CLI integration tests
//!
//! These run the built binary and only exercise paths that need neither network nor
//! a Docker daemon: help, configuration errors and manifest statistics.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const CREDENTIAL_VARS: [&str; 6] = [
    "DOCKER_USERNAME",
    "DOCKER_PASSWORD",
    "DOCKER_NAMESPACE",
    "GHCR_USERNAME",
    "GHCR_TOKEN",
    "GHCR_NAMESPACE",
];

/// Helper to get the path to the alpine-autobuild binary
fn autobuild_bin() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current executable path")
        .parent()
        .expect("No parent")
        .to_path_buf();

    if path.ends_with("deps") {
        path = path.parent().expect("No parent").to_path_buf();
    }

    path.join("alpine-autobuild")
}

/// Command rooted in `root` with no registry credentials inherited from the caller.
fn autobuild(root: &Path) -> Command {
    let mut cmd = Command::new(autobuild_bin());
    cmd.env("REPO_ROOT", root)
        .env_remove("MANIFEST_PATH")
        .env_remove("WORK_ROOT")
        .env_remove("LIMIT")
        .env_remove("DO_PUSH");
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("Failed to execute alpine-autobuild")
}

#[test]
fn test_cli_help() {
    let output = run(Command::new(autobuild_bin()).arg("--help"));

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("alpine-autobuild"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("plan"));
    assert!(stdout.contains("stats"));
}

#[test]
fn test_cli_version() {
    let output = run(Command::new(autobuild_bin()).arg("--version"));

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_stats_on_missing_manifest() {
    let dir = TempDir::new().unwrap();
    let output = run(autobuild(dir.path()).args(["stats", "--format", "json"]));

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stats output should be JSON");
    assert_eq!(value["total"], 0);
}

#[test]
fn test_stats_counts_statuses() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join(".work/manifest.json");
    fs::create_dir_all(manifest.parent().unwrap()).unwrap();
    fs::write(
        &manifest,
        r#"{
  "architectures": ["x86_64", "aarch64"],
  "images": {
    "3.21.4": {"version": "3.21.4", "status": "pushed", "createdAtUtc": "2026-01-02T03:04:05Z"},
    "3.22.1": {"version": "3.22.1", "status": "failed", "createdAtUtc": "2026-06-01T00:00:00Z"}
  }
}"#,
    )
    .unwrap();

    let output = run(autobuild(dir.path()).args(["stats", "--format", "yaml"]));

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("total: 2"));
    assert!(stdout.contains("pushed: 1"));
    assert!(stdout.contains("failed: 1"));
}

#[test]
fn test_stats_on_corrupt_manifest_fails() {
    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join(".work/manifest.json");
    fs::create_dir_all(manifest.parent().unwrap()).unwrap();
    fs::write(&manifest, "[1, 2").unwrap();

    let output = run(autobuild(dir.path()).arg("stats"));
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_run_without_credentials_fails_before_work() {
    let dir = TempDir::new().unwrap();
    let output = run(autobuild(dir.path()).arg("run"));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DOCKER_USERNAME"));
    assert!(!dir.path().join(".work/manifest.json").exists());
}

#[test]
fn test_run_with_invalid_boolean_fails() {
    let dir = TempDir::new().unwrap();
    let output = run(autobuild(dir.path())
        .env("ENABLE_HEALTH_CHECKS", "sometimes")
        .arg("run"));

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ENABLE_HEALTH_CHECKS"));
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    let output = run(Command::new(autobuild_bin()).arg("deploy"));
    assert!(!output.status.success());
}
