use std::path::Path;

use crate::config::ModelFormat;
use crate::error::Result;
use crate::math::Array2;

/// A trained per-ion-type regressor. One call predicts every row of `x`, in
/// row order.
pub trait IntensityModel {
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<f32>>;

    /// Human readable name, used in logs.
    fn name(&self) -> &str {
        "intensity model"
    }
}

/// Turns a verified model file into an [`IntensityModel`].
pub trait ModelLoader {
    fn load(&self, path: &Path, name: &str) -> Result<Box<dyn IntensityModel>>;

    /// File format this loader reads.
    fn format(&self) -> ModelFormat;
}
