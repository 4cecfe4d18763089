//! Integration tests for the tbsa-sim CLI.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use val_core::TargetConfig;

use env_logger as _;
use log as _;
use rstest as _;
use test_pool as _;
use thiserror as _;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().expect("test binary path");
    path.pop();
    path.pop();
    path.join("tbsa-sim")
}

fn write_target(dir: &Path, name: &str, config: &TargetConfig) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(config).expect("serialize")).expect("write");
    path
}

#[test]
fn list_prints_every_test() {
    let output = Command::new(binary_path())
        .arg("list")
        .output()
        .expect("failed to run tbsa-sim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for id in ["b007", "c003", "v001"] {
        assert!(stdout.contains(id), "{id} missing from:\n{stdout}");
    }
    assert!(stdout.contains("R220/R240_TBSA_KEY"));
}

#[test]
fn dump_target_prints_the_reference_target() {
    let output = Command::new(binary_path())
        .arg("dump-target")
        .output()
        .expect("failed to run tbsa-sim");

    assert!(output.status.success());
    let config: TargetConfig =
        serde_json::from_slice(&output.stdout).expect("dump-target emits a target");
    assert_eq!(config, TargetConfig::default());
}

#[test]
fn run_on_reference_target_passes() {
    let output = Command::new(binary_path())
        .arg("run")
        .output()
        .expect("failed to run tbsa-sim");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("v001  PASS"));
    assert!(stdout.contains("3 passed, 0 failed, 0 skipped, 0 pending over 2 boot(s)"));
}

#[test]
fn run_reports_failure_for_exposed_key() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut config = TargetConfig::default();
    config.keys[0].trusted_only = false;
    let target = write_target(temp_dir.path(), "exposed.json", &config);

    let output = Command::new(binary_path())
        .args(["run", "--target", target.to_str().expect("utf-8 path")])
        .output()
        .expect("failed to run tbsa-sim");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("c003  FAIL (checkpoint 8"));
}

#[test]
fn run_with_one_boot_leaves_a_test_pending() {
    let output = Command::new(binary_path())
        .args(["run", "--max-boots", "1"])
        .output()
        .expect("failed to run tbsa-sim");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("v001  AWAITING RESET"));
    assert!(stdout.contains("1 pending"));
}

#[test]
fn run_rejects_missing_and_invalid_targets() {
    let temp_dir = tempfile::tempdir().expect("temp dir");

    let output = Command::new(binary_path())
        .args(["run", "--target"])
        .arg(temp_dir.path().join("absent.json"))
        .output()
        .expect("failed to run tbsa-sim");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read"));

    let mut config = TargetConfig::default();
    config.memory.retain(|region| region.kind != val_core::MemoryType::Nvram);
    let target = write_target(temp_dir.path(), "no-nvram.json", &config);
    let output = Command::new(binary_path())
        .args(["run", "--target"])
        .arg(&target)
        .output()
        .expect("failed to run tbsa-sim");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid target description"));
}
