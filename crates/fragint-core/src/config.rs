//! Known fragmentation models, their artifact digests and inference backends.
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FragintError, Result};
use crate::ion_types::IonType;

/// Where published model files are fetched from when absent locally.
pub const DEFAULT_MODEL_URL: &str = "https://genesis.ugent.be/uvpublicdata/ms2pip";

/// SHA-1 digests of every published model file. A file not listed here is
/// never accepted unless the caller adds its digest explicitly.
pub static KNOWN_MODEL_HASHES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            "model_20210316_Immuno_HCD_B.xgboost",
            "977466d378de2e89c6ae15b4de8f07800d17a7b7",
        ),
        (
            "model_20210316_Immuno_HCD_Y.xgboost",
            "71948e1b9d6c69cb69b9baf84d361a9f80986fea",
        ),
        (
            "model_20210416_HCD2021_B.xgboost",
            "c086c599f618b199bbb36e2411701fb2866b24c8",
        ),
        (
            "model_20210416_HCD2021_Y.xgboost",
            "22a5a137e29e69fa6d4320ed7d701b61cbdc4fcf",
        ),
    ])
});

/// Named model presets, each bundling one model file per ion type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentationModel {
    Hcd2021,
    ImmunoHcd,
}

impl fmt::Display for FragmentationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FragmentationModel::Hcd2021 => "HCD2021",
            FragmentationModel::ImmunoHcd => "Immuno-HCD",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FragmentationModel {
    type Err = FragintError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hcd2021" | "hcd" => Ok(FragmentationModel::Hcd2021),
            "immuno-hcd" | "immuno_hcd" | "immuno" => Ok(FragmentationModel::ImmunoHcd),
            other => Err(FragintError::UnknownFragmentationModel {
                name: other.to_owned(),
            }),
        }
    }
}

impl FragmentationModel {
    /// Ion types and their model file names, in output order.
    pub fn ion_type_models(&self) -> Vec<(IonType, &'static str)> {
        match self {
            FragmentationModel::Hcd2021 => vec![
                (IonType::B, "model_20210416_HCD2021_B.xgboost"),
                (IonType::Y, "model_20210416_HCD2021_Y.xgboost"),
            ],
            FragmentationModel::ImmunoHcd => vec![
                (IonType::B, "model_20210316_Immuno_HCD_B.xgboost"),
                (IonType::Y, "model_20210316_Immuno_HCD_Y.xgboost"),
            ],
        }
    }

    /// The preset's files with the format and feature layout they were published in.
    pub fn model_set(&self) -> ModelSet {
        ModelSet {
            name: self.to_string(),
            ion_type_models: self
                .ion_type_models()
                .into_iter()
                .map(|(ion_type, file)| (ion_type, file.to_string()))
                .collect(),
            format: ModelFormat::XgboostBinary,
            layout: FeatureLayout::Native,
        }
    }
}

/// On-disk encoding of a model file.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// Binary XGBoost booster.
    XgboostBinary,
    /// Text dump: the base score on one line, then a JSON array of trees.
    GbdtDump,
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormat::XgboostBinary => write!(f, "binary XGBoost booster"),
            ModelFormat::GbdtDump => write!(f, "tree dump"),
        }
    }
}

/// Feature vector a model was trained on.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeatureLayout {
    /// Vector computed by the native fragmentation engine.
    Native,
    /// Mass-based vector of `BasicFeatureBuilder`.
    Basic,
}

impl fmt::Display for FeatureLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureLayout::Native => write!(f, "native"),
            FeatureLayout::Basic => write!(f, "basic"),
        }
    }
}

/// One model file per ion type, all sharing a file format and feature layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    pub name: String,
    pub ion_type_models: Vec<(IonType, String)>,
    pub format: ModelFormat,
    pub layout: FeatureLayout,
}

impl ModelSet {
    /// Fail unless a loader reading `format` and a builder emitting `layout`
    /// fit these models.
    pub fn check_compatible(&self, format: ModelFormat, layout: FeatureLayout) -> Result<()> {
        if self.format != format {
            return Err(FragintError::IncompatibleModels {
                models: self.name.clone(),
                reason: format!(
                    "files are {}s but the selected backend reads {}s",
                    self.format, format
                ),
            });
        }
        if self.layout != layout {
            return Err(FragintError::IncompatibleModels {
                models: self.name.clone(),
                reason: format!(
                    "trained on the {} feature layout but features are built with the {} layout",
                    self.layout, layout
                ),
            });
        }
        Ok(())
    }
}

/// How verified model files are turned into predictors.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// XGBoost model dumps evaluated with the pure Rust `gbdt` crate.
    #[default]
    Gbdt,
    /// Binary XGBoost boosters through libxgboost; needs the `xgboost` feature.
    Xgboost,
}

impl ModelBackend {
    /// File format this backend loads.
    pub fn format(&self) -> ModelFormat {
        match self {
            ModelBackend::Gbdt => ModelFormat::GbdtDump,
            ModelBackend::Xgboost => ModelFormat::XgboostBinary,
        }
    }
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" => Ok(ModelBackend::Gbdt),
            "xgboost" => Ok(ModelBackend::Xgboost),
            _ => Err(format!(
                "Unknown model backend: {}. To use xgboost, please compile with `--features xgboost`",
                s
            )),
        }
    }
}
