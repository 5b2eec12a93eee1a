use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use log::debug;
use serde_json::Value;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use crate::config::ModelFormat;
use crate::error::{FragintError, Result};
use crate::math::Array2;
use crate::models::intensity_model::{IntensityModel, ModelLoader};

/// Objective the published regressors were trained with.
const OBJECTIVE: &str = "reg:linear";

/// Gradient boosted trees loaded from an XGBoost model dump in the layout read
/// by the `gbdt` crate: the base score on the first line, then a JSON array of
/// trees.
pub struct GbdtModel {
    model: GBDT,
    name: String,
    n_features: usize,
}

impl GbdtModel {
    pub fn from_xgboost_dump(path: &Path, name: &str) -> Result<Self> {
        let dump = fs::read_to_string(path).map_err(|e| {
            FragintError::invalid_model(name, format!("cannot read tree dump: {}", e))
        })?;
        Self::from_dump_str(&dump, name)
    }

    pub fn from_dump_str(dump: &str, name: &str) -> Result<Self> {
        let n_features = required_features(dump, name)?;
        let model = GBDT::from_xgboost_reader(Cursor::new(dump), OBJECTIVE).map_err(|e| {
            FragintError::invalid_model(name, format!("cannot parse tree dump: {}", e))
        })?;
        Ok(Self {
            model,
            name: name.to_string(),
            n_features,
        })
    }

    /// Number of feature columns a row must carry for every split to resolve.
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Scan the tree array of a dump for the highest split feature index.
fn required_features(dump: &str, name: &str) -> Result<usize> {
    let trees: String = dump.lines().skip(1).collect();
    let trees: Value = serde_json::from_str(&trees)
        .map_err(|e| FragintError::invalid_model(name, format!("cannot parse tree dump: {}", e)))?;
    let trees = trees
        .as_array()
        .ok_or_else(|| FragintError::invalid_model(name, "tree dump is not an array of trees"))?;

    let mut required = 0;
    let mut stack: Vec<&Value> = trees.iter().collect();
    while let Some(node) = stack.pop() {
        if let Some(split) = node.get("split") {
            let index = split_index(split).ok_or_else(|| {
                FragintError::invalid_model(name, format!("bad split feature {}", split))
            })?;
            required = required.max(index + 1);
        }
        if let Some(children) = node.get("children").and_then(Value::as_array) {
            stack.extend(children.iter());
        }
    }
    Ok(required)
}

fn split_index(split: &Value) -> Option<usize> {
    if let Some(index) = split.as_u64() {
        return usize::try_from(index).ok();
    }
    let feature = split.as_str()?;
    let digits = feature.trim_start_matches(|c: char| !c.is_ascii_digit());
    digits.parse().ok()
}

impl IntensityModel for GbdtModel {
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        if x.nrows() > 0 && x.ncols() < self.n_features {
            return Err(FragintError::invalid_model(
                &self.name,
                format!(
                    "trees split on {} features but rows carry {}",
                    self.n_features,
                    x.ncols()
                ),
            ));
        }
        let mut test_x = DataVec::with_capacity(x.nrows());
        for row in x.rows() {
            test_x.push(Data::new_test_data(row.to_vec(), None));
        }
        let predictions = self.model.predict(&test_x);
        if predictions.len() != x.nrows() {
            return Err(FragintError::invalid_model(
                &self.name,
                format!(
                    "returned {} predictions for {} rows",
                    predictions.len(),
                    x.nrows()
                ),
            ));
        }
        Ok(predictions)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GbdtLoader;

impl ModelLoader for GbdtLoader {
    fn load(&self, path: &Path, name: &str) -> Result<Box<dyn IntensityModel>> {
        debug!("Loading tree dump {} from {}", name, path.display());
        Ok(Box::new(GbdtModel::from_xgboost_dump(path, name)?))
    }

    fn format(&self) -> ModelFormat {
        ModelFormat::GbdtDump
    }
}
