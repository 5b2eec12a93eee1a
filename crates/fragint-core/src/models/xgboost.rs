use log::debug;
use std::path::Path;
use xgb::{Booster, DMatrix};

use crate::config::ModelFormat;
use crate::error::{FragintError, Result};
use crate::math::Array2;
use crate::models::intensity_model::{IntensityModel, ModelLoader};

/// A binary XGBoost booster evaluated through libxgboost.
pub struct XgboostModel {
    booster: Booster,
    name: String,
}

impl XgboostModel {
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        let booster = Booster::load(path)
            .map_err(|e| FragintError::invalid_model(name, format!("cannot load booster: {}", e)))?;
        Ok(Self {
            booster,
            name: name.to_string(),
        })
    }
}

impl IntensityModel for XgboostModel {
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<f32>> {
        debug!(
            "Creating DMatrix from dense data: rows={}, cols={}, len={}",
            x.nrows(),
            x.ncols(),
            x.as_slice().len()
        );
        // `from_dense` expects the number of rows as the second argument.
        let dmat = DMatrix::from_dense(x.as_slice(), x.nrows())
            .map_err(|e| FragintError::invalid_model(&self.name, e.to_string()))?;
        self.booster
            .predict(&dmat)
            .map_err(|e| FragintError::invalid_model(&self.name, e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XgboostLoader;

impl ModelLoader for XgboostLoader {
    fn load(&self, path: &Path, name: &str) -> Result<Box<dyn IntensityModel>> {
        Ok(Box::new(XgboostModel::load(path, name)?))
    }

    fn format(&self) -> ModelFormat {
        ModelFormat::XgboostBinary
    }
}
