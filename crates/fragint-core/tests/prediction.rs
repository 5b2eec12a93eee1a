//! Integration tests for model artifacts and batch prediction.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use std::time::Duration;

use fragint_core::artifacts::{file_digest, ArtifactState, ModelArtifactManager};
use fragint_core::config::{FeatureLayout, ModelFormat, ModelSet};
use fragint_core::features::BasicFeatureBuilder;
use fragint_core::ion_types::IonType;
use fragint_core::math::Array2;
use fragint_core::models::gbdt::GbdtLoader;
use fragint_core::models::{IntensityModel, ModelLoader};
use fragint_core::modifications::{ModCategory, ModificationRegistry};
use fragint_core::predictor::{BatchPredictor, PredictionRecord};
use fragint_core::{FragintError, Result};

/// Predicts the N-terminal fragment mass column scaled down, so intensities
/// follow the cleavage position.
struct FragmentMassModel;

impl IntensityModel for FragmentMassModel {
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        Ok(x.rows().map(|row| row[3] / 1000.0).collect())
    }

    fn name(&self) -> &str {
        "fragment-mass"
    }
}

struct FragmentMassLoader;

impl ModelLoader for FragmentMassLoader {
    fn load(&self, _path: &Path, _name: &str) -> Result<Box<dyn IntensityModel>> {
        Ok(Box::new(FragmentMassModel))
    }

    fn format(&self) -> ModelFormat {
        ModelFormat::GbdtDump
    }
}

fn offline_manager(dir: &Path) -> ModelArtifactManager {
    // Port 9 (discard) is closed on test hosts, so downloads fail fast.
    ModelArtifactManager::new(dir).with_base_url("http://127.0.0.1:9/models")
}

fn publish(dir: &Path, manager: ModelArtifactManager, name: &str) -> ModelArtifactManager {
    let path = dir.join(name);
    fs::write(&path, format!("model body {}", name)).unwrap();
    let digest = file_digest(&path).unwrap();
    manager.with_expected_hash(name, digest.to_uppercase())
}

/// Answer a single GET on a local port with `body`, announcing
/// `content_length` bytes, then close the connection.
fn serve_once(status: &'static str, body: Vec<u8>, content_length: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request_head(&mut stream);
        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status, content_length
        );
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&body);
        let _ = stream.flush();
    });
    format!("http://{}/models", addr)
}

/// Accept a connection and never answer it.
fn serve_nothing(hold: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request_head(&mut stream);
        thread::sleep(hold);
    });
    format!("http://{}/models", addr)
}

fn read_request_head(stream: &mut impl Read) {
    let mut head = Vec::new();
    let mut buffer = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buffer[..n]),
        }
    }
}

fn digest_of(dir: &Path, body: &[u8]) -> String {
    let path = dir.join("digest.tmp");
    fs::write(&path, body).unwrap();
    let digest = file_digest(&path).unwrap();
    fs::remove_file(&path).unwrap();
    digest
}

fn leftover_part_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
                .count()
        })
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[test]
fn absent_artifact_is_downloaded_and_verified() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("cache");
    let body = b"0\n[{\"nodeid\":0,\"leaf\":0.25}]\n".to_vec();
    let digest = digest_of(dir.path(), &body);
    let url = serve_once("200 OK", body.clone(), body.len());
    let manager = ModelArtifactManager::new(&cache)
        .with_base_url(url)
        .with_expected_hash("b.model", digest);

    assert_eq!(manager.state("b.model"), ArtifactState::Absent);
    let path = manager.ensure_present("b.model").unwrap();
    assert_eq!(path, cache.join("b.model"));
    assert_eq!(fs::read(&path).unwrap(), body);
    assert_eq!(manager.state("b.model"), ArtifactState::Verified);
    assert_eq!(leftover_part_files(&cache), 0);
    // the server is gone, so this must come from the verified cache
    assert_eq!(manager.ensure_present("b.model").unwrap(), path);
}

#[test]
fn downloaded_artifact_with_wrong_digest_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let body = b"not the published model".to_vec();
    let url = serve_once("200 OK", body.clone(), body.len());
    let manager = ModelArtifactManager::new(dir.path())
        .with_base_url(url)
        .with_expected_hash("b.model", "0".repeat(40));

    let err = manager.ensure_present("b.model").unwrap_err();
    assert!(matches!(err, FragintError::InvalidModel { .. }), "{:?}", err);
    assert!(!err.is_transient());
    assert_eq!(manager.state("b.model"), ArtifactState::Corrupt);
    assert!(!dir.path().join("b.model").exists());
    assert_eq!(leftover_part_files(dir.path()), 0);
}

#[test]
fn interrupted_download_leaves_no_part_file() {
    let dir = tempfile::tempdir().unwrap();
    let url = serve_once("200 OK", b"truncated".to_vec(), 4096);
    let manager = ModelArtifactManager::new(dir.path())
        .with_base_url(url)
        .with_expected_hash("b.model", "0".repeat(40));

    let err = manager.ensure_present("b.model").unwrap_err();
    assert!(matches!(err, FragintError::Download { .. }), "{:?}", err);
    assert!(err.is_transient());
    assert_eq!(manager.state("b.model"), ArtifactState::Absent);
    assert!(!dir.path().join("b.model").exists());
    assert_eq!(leftover_part_files(dir.path()), 0);
}

#[test]
fn missing_remote_file_is_a_download_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = serve_once("404 Not Found", Vec::new(), 0);
    let manager = ModelArtifactManager::new(dir.path())
        .with_base_url(url)
        .with_expected_hash("b.model", "0".repeat(40));

    let err = manager.ensure_present("b.model").unwrap_err();
    assert!(matches!(err, FragintError::Download { .. }), "{:?}", err);
    assert_eq!(manager.state("b.model"), ArtifactState::Absent);
}

#[test]
fn stalled_server_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let url = serve_nothing(Duration::from_secs(5));
    let manager = ModelArtifactManager::new(dir.path())
        .with_base_url(url)
        .with_timeout(Duration::from_millis(300))
        .with_expected_hash("b.model", "0".repeat(40));

    let err = manager.ensure_present("b.model").unwrap_err();
    assert!(matches!(err, FragintError::Download { .. }), "{:?}", err);
    assert!(err.is_transient());
    assert_eq!(manager.state("b.model"), ArtifactState::Absent);
    assert_eq!(leftover_part_files(dir.path()), 0);
}

#[test]
fn verified_artifact_is_returned_and_cached() {
    let dir = tempfile::tempdir().unwrap();
    let manager = publish(dir.path(), offline_manager(dir.path()), "b.model");

    assert_eq!(manager.state("b.model"), ArtifactState::Absent);
    let path = manager.ensure_present("b.model").unwrap();
    assert_eq!(path, dir.path().join("b.model"));
    assert_eq!(manager.state("b.model"), ArtifactState::Verified);
    assert_eq!(manager.ensure_present("b.model").unwrap(), path);
}

#[test]
fn tampered_artifact_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let manager = publish(dir.path(), offline_manager(dir.path()), "b.model");
    fs::write(dir.path().join("b.model"), "something else").unwrap();

    assert!(matches!(
        manager.ensure_present("b.model"),
        Err(FragintError::InvalidModel { .. })
    ));
    assert_eq!(manager.state("b.model"), ArtifactState::Corrupt);
}

#[test]
fn failed_download_is_transient() {
    let dir = tempfile::tempdir().unwrap();
    let manager = offline_manager(dir.path()).with_expected_hash("y.model", "00");

    let err = manager.ensure_present("y.model").unwrap_err();
    assert!(matches!(err, FragintError::Download { .. }), "{:?}", err);
    assert!(err.is_transient());
    assert_eq!(manager.state("y.model"), ArtifactState::Absent);
    assert!(!dir.path().join("y.model").exists());
}

#[test]
fn concurrent_callers_agree() {
    let dir = tempfile::tempdir().unwrap();
    let manager = publish(dir.path(), offline_manager(dir.path()), "b.model");

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| manager.ensure_present("b.model")))
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
    });
    assert_eq!(manager.state("b.model"), ArtifactState::Verified);
}

// ---------------------------------------------------------------------------
// Batch prediction
// ---------------------------------------------------------------------------

#[test]
fn modified_batch_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let manager = offline_manager(dir.path());
    let manager = publish(dir.path(), manager, "b.model");
    let manager = publish(dir.path(), manager, "y.model");

    let mut registry = ModificationRegistry::new();
    registry
        .register(&["Oxidation,15.994915,opt,M"], ModCategory::Ptm)
        .unwrap();
    registry
        .register(&["Acetyl,42.010565,opt,N-term"], ModCategory::Sptm)
        .unwrap();
    let builder = BasicFeatureBuilder::new(&registry);
    let predictor = BatchPredictor::new(&registry, &manager, &builder, &FragmentMassLoader);

    let records = vec![
        PredictionRecord::new("plain", "PEPTMDEK", "-", 2),
        PredictionRecord::new("mods", "PEPTMDEK", "0|Acetyl|5|Oxidation", 2),
    ];
    let batch = predictor
        .predict_batch(&records, &[("b", "b.model"), ("y", "y.model")])
        .unwrap();

    assert_eq!(batch.ion_types, vec![IonType::B, IonType::Y]);
    assert_eq!(batch.peptide_lengths, vec![8, 8]);
    for record in &batch.intensities {
        assert_eq!(record.len(), 2);
        assert!(record.iter().all(|values| values.len() == 7));
        // rows run N to C, so b keeps that order and y comes out reversed
        assert!(record[0].windows(2).all(|w| w[0] < w[1]));
        assert!(record[1].windows(2).all(|w| w[0] > w[1]));
    }
    // N-terminal acetylation shifts every b ion by the same amount
    let shift = batch.mz_arrays[1][0][0] - batch.mz_arrays[0][0][0];
    assert!((shift - 42.010565).abs() < 1e-3);
    let oxidized_b5 = batch.mz_arrays[1][0][4] - batch.mz_arrays[0][0][4];
    assert!((oxidized_b5 - 42.010565 - 15.994915).abs() < 1e-3);
}

#[test]
fn batch_without_published_models_fails_before_inference() {
    let dir = tempfile::tempdir().unwrap();
    let manager = offline_manager(dir.path());
    let registry = ModificationRegistry::new();
    let builder = BasicFeatureBuilder::new(&registry);
    let predictor = BatchPredictor::new(&registry, &manager, &builder, &FragmentMassLoader);

    let records = vec![PredictionRecord::new("s1", "PEPTIDEK", "-", 2)];
    assert!(matches!(
        predictor.predict_batch(&records, &[("b", "unpublished.model")]),
        Err(FragintError::InvalidModel { .. })
    ));
}

#[test]
fn downloaded_tree_dump_predicts_through_the_gbdt_backend() {
    let dir = tempfile::tempdir().unwrap();
    // one stump on the cleavage index column
    let body = b"0\n[{\"nodeid\":0,\"split\":\"f0\",\"split_condition\":3.5,\"yes\":1,\"no\":2,\
        \"missing\":1,\"children\":[{\"nodeid\":1,\"leaf\":1.0},{\"nodeid\":2,\"leaf\":2.0}]}]\n"
        .to_vec();
    let digest = digest_of(dir.path(), &body);
    let url = serve_once("200 OK", body.clone(), body.len());
    let manager = ModelArtifactManager::new(dir.path())
        .with_base_url(url)
        .with_expected_hash("stump.dump", digest);

    let registry = ModificationRegistry::new();
    let builder = BasicFeatureBuilder::new(&registry);
    let predictor = BatchPredictor::new(&registry, &manager, &builder, &GbdtLoader);
    let models = ModelSet {
        name: "stumps".to_string(),
        ion_type_models: vec![
            (IonType::B, "stump.dump".to_string()),
            (IonType::Y, "stump.dump".to_string()),
        ],
        format: ModelFormat::GbdtDump,
        layout: FeatureLayout::Basic,
    };

    let records = vec![PredictionRecord::new("s1", "PEPTIDEK", "-", 2)];
    let batch = predictor.predict_model_set(&records, &models).unwrap();
    assert_eq!(batch.intensities[0][0], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    assert_eq!(batch.intensities[0][1], vec![2.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0]);
    assert_eq!(manager.state("stump.dump"), ArtifactState::Verified);
}
