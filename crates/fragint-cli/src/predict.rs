use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use fragint_core::features::{BasicFeatureBuilder, FeatureVectorBuilder};
use fragint_core::models::build_loader;
use fragint_core::predictor::BatchPredictor;

use crate::config::PredictionConfig;
use crate::output::write_predictions;
use crate::peprec::read_peprec;

/// Output prefix: the configured one, else the PEPREC path without extension.
pub fn output_prefix(config: &PredictionConfig, peprec_path: &Path) -> String {
    match &config.output_file {
        Some(prefix) => prefix.clone(),
        None => peprec_path.with_extension("").to_string_lossy().into_owned(),
    }
}

/// Predict every peptide of a PEPREC file and write the predictions CSV.
pub fn run_prediction(config: &PredictionConfig, peprec_path: &Path) -> Result<PathBuf> {
    let start = Instant::now();
    let models = config.model_set()?;
    let registry = config.modification_registry()?;
    let artifacts = config.artifact_manager();
    let builder = BasicFeatureBuilder::new(&registry);
    let loader = build_loader(config.model_backend)?;
    models
        .check_compatible(loader.format(), builder.layout())
        .context("Configure `models`, `model_format` and `feature_layout` for other model files")?;
    log::info!(
        "Using {} models from {:?}",
        models.name,
        artifacts.cache_dir()
    );

    let records = read_peprec(peprec_path)?;
    let mut predictor = BatchPredictor::new(&registry, &artifacts, &builder, loader.as_ref());
    if let Some(processes) = config.processes {
        predictor = predictor.with_num_threads(processes)?;
    }

    let batch = predictor
        .predict_model_set(&records, &models)
        .with_context(|| format!("Prediction failed for {:?}", peprec_path))?;

    let path = write_predictions(&batch, &output_prefix(config, peprec_path))?;
    log::info!(
        "Predicted {} peptides in {:.2}s",
        batch.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(path)
}
