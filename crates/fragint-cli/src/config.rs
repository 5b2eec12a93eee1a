use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fragint_core::artifacts::{default_cache_dir, ModelArtifactManager};
use fragint_core::config::{
    FeatureLayout, FragmentationModel, ModelBackend, ModelFormat, ModelSet, DEFAULT_MODEL_URL,
};
use fragint_core::ion_types::IonType;
use fragint_core::modifications::{ModCategory, ModificationRegistry};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PredictionConfig {
    pub version: String,
    /// Fragmentation model preset, e.g. `HCD2021` or `Immuno-HCD`.
    pub model: String,
    /// Model cache directory; `None` falls back to `$FRAGINT_MODEL_DIR` or the home directory.
    pub model_dir: Option<String>,
    pub model_url: String,
    pub model_backend: ModelBackend,
    /// `[ion type, model file]` pairs replacing the preset's files when not empty.
    pub models: Vec<(String, String)>,
    /// Format of the files in `models`.
    pub model_format: ModelFormat,
    /// Feature layout the files in `models` were trained on.
    pub feature_layout: FeatureLayout,
    pub ptm: Vec<String>,
    pub sptm: Vec<String>,
    /// Extra `file name -> SHA-1` entries for model files outside the published set.
    pub model_hashes: HashMap<String, String>,
    pub processes: Option<usize>,
    /// Output prefix; `<prefix>_predictions.csv` is written. Defaults to the PEPREC path stem.
    pub output_file: Option<String>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        PredictionConfig {
            version: clap::crate_version!().to_string(),
            model: FragmentationModel::Hcd2021.to_string(),
            model_dir: None,
            model_url: DEFAULT_MODEL_URL.to_string(),
            model_backend: ModelBackend::default(),
            models: Vec::new(),
            model_format: ModelFormat::GbdtDump,
            feature_layout: FeatureLayout::Basic,
            ptm: vec![
                String::from("Oxidation,15.994915,opt,M"),
                String::from("Carbamidomethyl,57.021464,opt,C"),
                String::from("Acetyl,42.010565,opt,N-term"),
            ],
            sptm: Vec::new(),
            model_hashes: HashMap::new(),
            processes: None,
            output_file: None,
        }
    }
}

impl PredictionConfig {
    /// Read a JSON config. Missing or invalid fields keep their defaults.
    pub fn from_json_file(config_path: &Path) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Config file is not valid JSON: {:?}", config_path))?;
        let mut config = PredictionConfig::default();

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field), config.$field
                        );
                    }
                } else {
                    log::debug!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field), config.$field
                    );
                }
            };
        }

        load_or_default!(model);
        load_or_default!(model_dir);
        load_or_default!(model_url);
        load_or_default!(model_backend);
        load_or_default!(models);
        load_or_default!(model_format);
        load_or_default!(feature_layout);
        load_or_default!(ptm);
        load_or_default!(sptm);
        load_or_default!(model_hashes);
        load_or_default!(processes);
        load_or_default!(output_file);

        Ok(config)
    }

    /// Config from an optional file, then command line overrides.
    pub fn from_arguments(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_json_file(path)?,
            None => PredictionConfig::default(),
        };

        // Apply CLI overrides
        if let Some(model) = matches.get_one::<String>("model") {
            config.model = model.clone();
        }
        if let Some(model_dir) = matches.get_one::<String>("model_dir") {
            config.model_dir = Some(model_dir.clone());
        }
        if let Some(output_file) = matches.get_one::<String>("output_file") {
            config.output_file = Some(output_file.clone());
        }
        if let Some(processes) = matches.get_one::<usize>("processes") {
            config.processes = Some(*processes);
        }
        if let Some(backend) = matches.get_one::<String>("model_backend") {
            config.model_backend = ModelBackend::from_str(backend).map_err(anyhow::Error::msg)?;
        }

        Ok(config)
    }

    pub fn fragmentation_model(&self) -> Result<FragmentationModel> {
        FragmentationModel::from_str(&self.model)
            .with_context(|| format!("Unknown model preset in config: {}", self.model))
    }

    /// The configured model files: `models` when given, else the preset's.
    pub fn model_set(&self) -> Result<ModelSet> {
        if self.models.is_empty() {
            return Ok(self.fragmentation_model()?.model_set());
        }
        let ion_type_models = self
            .models
            .iter()
            .map(|(ion_type, file)| -> Result<(IonType, String)> {
                let ion_type = IonType::from_str(ion_type)
                    .with_context(|| format!("Invalid ion type for model file {}", file))?;
                Ok((ion_type, file.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ModelSet {
            name: "custom".to_string(),
            ion_type_models,
            format: self.model_format,
            layout: self.feature_layout,
        })
    }

    /// `(ion type, model file)` pairs of [`Self::model_set`].
    pub fn ion_type_models(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .model_set()?
            .ion_type_models
            .into_iter()
            .map(|(ion_type, file)| (ion_type.to_string(), file))
            .collect())
    }

    /// Registry with the configured PTMs first, then the SPTMs.
    pub fn modification_registry(&self) -> Result<ModificationRegistry> {
        let mut registry = ModificationRegistry::new();
        registry
            .register(&self.ptm, ModCategory::Ptm)
            .context("Invalid entry in 'ptm'")?;
        registry
            .register(&self.sptm, ModCategory::Sptm)
            .context("Invalid entry in 'sptm'")?;
        log::info!("Registered {} modifications", registry.len());
        Ok(registry)
    }

    pub fn artifact_manager(&self) -> ModelArtifactManager {
        let cache_dir = self
            .model_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);
        let mut manager =
            ModelArtifactManager::new(cache_dir).with_base_url(self.model_url.as_str());
        manager.add_expected_hashes(self.model_hashes.clone());
        manager
    }
}
