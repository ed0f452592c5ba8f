//! End-to-end tests for the pplink binary that need no network access.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::tempdir;

fn pplink(env_file: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pplink"))
        .arg("--env-file")
        .arg(env_file)
        .args(args)
        .env_remove("PPLINK_ENV_FILE")
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run pplink")
}

#[test]
fn test_config_set_show_unset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, "# deployment\nRESOURCE_GROUP=rg-old\n").unwrap();

    let out = pplink(&path, &["config", "set", "RESOURCE_GROUP", "rg-new"]);
    assert!(out.status.success());
    let out = pplink(&path, &["config", "set", "AZURE_LOCATION", "westeurope"]);
    assert!(out.status.success());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "# deployment\nRESOURCE_GROUP=rg-new\nAZURE_LOCATION=westeurope\n"
    );

    let out = pplink(&path, &["config", "show"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("RESOURCE_GROUP=rg-new"));
    assert!(stdout.contains("AZURE_LOCATION=westeurope"));

    let out = pplink(&path, &["config", "unset", "AZURE_LOCATION"]);
    assert!(out.status.success());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "# deployment\nRESOURCE_GROUP=rg-new\n"
    );
}

#[test]
fn test_invalid_key_is_invalid_argument() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".env");

    let out = pplink(&path, &["config", "set", "NOT A KEY", "x"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_link_without_configuration_is_missing_prerequisite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, "AZURE_SUBSCRIPTION_ID=8f2c3a51-2d4b-4f6e-9a0b-1c2d3e4f5a6b\n").unwrap();

    let out = pplink(&path, &["link"]);
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("POWER_PLATFORM_ENVIRONMENT_NAME"));
}

#[test]
fn test_cleanup_with_everything_skipped_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".env");

    let out = pplink(
        &path,
        &[
            "cleanup",
            "--skip-unlink",
            "--skip-environment",
            "--skip-policy",
            "--skip-resource-group",
        ],
    );
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_malformed_subscription_is_invalid_argument() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, "AZURE_SUBSCRIPTION_ID=my-subscription\n").unwrap();

    let out = pplink(&path, &["status"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_offline_status_prints_configuration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, "RESOURCE_GROUP=rg-test\n").unwrap();

    let out = pplink(&path, &["status", "--offline"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("rg-test"));
}

#[test]
fn test_unknown_flag_is_invalid_argument() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".env");

    let out = pplink(&path, &["cleanup", "--skip-everything"]);
    assert_eq!(out.status.code(), Some(2));
}
