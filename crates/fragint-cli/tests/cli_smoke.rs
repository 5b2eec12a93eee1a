//! CLI binary smoke tests using assert_cmd.
//!
//! None of these reach the network: prediction runs either fail before any
//! model file is needed or find their models already in the cache.

use assert_cmd::Command;
use fragint_core::artifacts::file_digest;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn cmd() -> Command {
    Command::cargo_bin("fragint").unwrap()
}

/// Cache a one-stump tree dump on the cleavage index and write a config
/// using it for b and y ions.
fn custom_model_config(dir: &Path) -> PathBuf {
    let model_dir = dir.join("models");
    fs::create_dir_all(&model_dir).unwrap();
    let dump = model_dir.join("stump.dump");
    fs::write(
        &dump,
        "0\n[{\"nodeid\":0,\"split\":\"f0\",\"split_condition\":3.5,\"yes\":1,\"no\":2,\
         \"missing\":1,\"children\":[{\"nodeid\":1,\"leaf\":1.0},{\"nodeid\":2,\"leaf\":2.0}]}]\n",
    )
    .unwrap();
    let digest = file_digest(&dump).unwrap();
    let config = dir.join("config.json");
    let json = serde_json::json!({
        "models": [["b", "stump.dump"], ["y", "stump.dump"]],
        "model_format": "gbdt_dump",
        "feature_layout": "basic",
        "model_hashes": { "stump.dump": digest },
        "model_url": "http://127.0.0.1:9/models",
        "model_dir": model_dir,
    });
    fs::write(&config, json.to_string()).unwrap();
    config
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("predict-batch"))
        .stdout(predicate::str::contains("scan-mgf"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fragint"));
}

// ---------------------------------------------------------------------------
// predict-batch
// ---------------------------------------------------------------------------

#[test]
fn predict_batch_requires_peprec() {
    cmd()
        .arg("predict-batch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<peprec>"));
}

#[test]
fn predict_batch_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = custom_model_config(dir.path());
    cmd()
        .env("FRAGINT_LOG", "error")
        .args(["predict-batch", "/nonexistent/input.peprec"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to open PEPREC file"));
}

#[test]
fn predict_batch_unknown_preset_fails() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["predict-batch", "input.peprec", "--model", "CID"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("CID"));
}

#[test]
fn predict_batch_default_preset_is_rejected_before_download() {
    let dir = tempfile::tempdir().unwrap();
    let peprec = dir.path().join("input.peprec");
    fs::write(&peprec, "spec_id modifications peptide charge\ns1 - PEPTIDEK 2\n").unwrap();
    let model_dir = dir.path().join("models");

    cmd()
        .env("FRAGINT_LOG", "error")
        .arg("predict-batch")
        .arg(&peprec)
        .arg("--model-dir")
        .arg(&model_dir)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("HCD2021"))
        .stderr(predicate::str::contains("tree dump"));
    assert!(!model_dir.exists());
}

#[test]
fn predict_batch_with_cached_custom_models() {
    let dir = tempfile::tempdir().unwrap();
    let config = custom_model_config(dir.path());
    let peprec = dir.path().join("input.peprec");
    fs::write(&peprec, "spec_id modifications peptide charge\ns1 - PEPTIDEK 2\n").unwrap();

    cmd()
        .env("FRAGINT_LOG", "error")
        .arg("predict-batch")
        .arg(&peprec)
        .arg(&config)
        .assert()
        .success();

    let csv = fs::read_to_string(dir.path().join("input_predictions.csv")).unwrap();
    let rows: Vec<Vec<&str>> = csv.lines().skip(1).map(|l| l.split(',').collect()).collect();
    assert_eq!(rows.len(), 14);
    let prediction = |ion: &str, number: &str| {
        rows.iter()
            .find(|r| r[2] == ion && r[3] == number)
            .map(|r| r[5].to_string())
            .unwrap()
    };
    assert_eq!(prediction("B", "1"), "1.000000");
    assert_eq!(prediction("B", "7"), "2.000000");
    assert_eq!(prediction("Y", "1"), "2.000000");
    assert_eq!(prediction("Y", "7"), "1.000000");
}

#[test]
fn predict_batch_invalid_peptide_fails_before_models() {
    let dir = tempfile::tempdir().unwrap();
    let config = custom_model_config(dir.path());
    let peprec = dir.path().join("input.peprec");
    fs::write(
        &peprec,
        "spec_id modifications peptide charge\ns1 - PEPTIDEK 2\ns2 - PEPXIDEK 2\n",
    )
    .unwrap();

    cmd()
        .env("FRAGINT_LOG", "error")
        .arg("predict-batch")
        .arg(&peprec)
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unsupported amino acid"));
    assert!(!dir.path().join("input_predictions.csv").exists());
}

#[test]
fn predict_batch_bad_config_value_fails() {
    let dir = tempfile::tempdir().unwrap();
    let peprec = dir.path().join("input.peprec");
    fs::write(&peprec, "spec_id modifications peptide charge\ns1 - PEPTIDEK 2\n").unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"ptm": ["Oxidation,15.994915,opt"]}"#).unwrap();

    cmd()
        .env("FRAGINT_LOG", "error")
        .arg("predict-batch")
        .arg(&peprec)
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ptm"));
}

// ---------------------------------------------------------------------------
// scan-mgf
// ---------------------------------------------------------------------------

#[test]
fn scan_mgf_writes_scanned_file() {
    let dir = tempfile::tempdir().unwrap();
    let mgf = dir.path().join("run.mgf");
    fs::write(
        &mgf,
        "BEGIN IONS\nTITLE=s1\n100.0 5.0\nEND IONS\nBEGIN IONS\nTITLE=s9\n100.0 5.0\nEND IONS\n",
    )
    .unwrap();
    let peprec = dir.path().join("input.peprec");
    fs::write(&peprec, "spec_id modifications peptide charge\ns1 - PEPTIDEK 2\n").unwrap();

    cmd().arg("scan-mgf").arg(&mgf).arg(&peprec).assert().success();

    let scanned = fs::read_to_string(dir.path().join("run_scanned.mgf")).unwrap();
    assert!(scanned.contains("TITLE=s1"));
    assert!(!scanned.contains("TITLE=s9"));
}

#[test]
fn scan_mgf_directory_writes_one_combined_file() {
    let dir = tempfile::tempdir().unwrap();
    let runs = dir.path().join("runs");
    fs::create_dir(&runs).unwrap();
    fs::write(runs.join("a.mgf"), "BEGIN IONS\nTITLE=s1\n100.0 5.0\nEND IONS\n").unwrap();
    fs::write(runs.join("b.mgf"), "BEGIN IONS\nTITLE=s2\n200.0 5.0\nEND IONS\n").unwrap();
    let peprec = dir.path().join("input.peprec");
    fs::write(
        &peprec,
        "spec_id modifications peptide charge mgf_filename\ns1 - PEPTIDEK 2 a\ns2 - PEPTIDEK 2 b\n",
    )
    .unwrap();

    cmd().arg("scan-mgf").arg(&runs).arg(&peprec).assert().success();

    let scanned = fs::read_to_string(dir.path().join("runs_scanned.mgf")).unwrap();
    assert!(scanned.contains("TITLE=s1"));
    assert!(scanned.contains("TITLE=s2"));
}

#[test]
fn scan_mgf_missing_mgf_fails() {
    let dir = tempfile::tempdir().unwrap();
    let peprec = dir.path().join("input.peprec");
    fs::write(&peprec, "spec_id modifications peptide charge\ns1 - PEPTIDEK 2\n").unwrap();

    cmd()
        .arg("scan-mgf")
        .arg(dir.path().join("absent.mgf"))
        .arg(&peprec)
        .assert()
        .code(1);
}
