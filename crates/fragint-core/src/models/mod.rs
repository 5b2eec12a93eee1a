pub mod factory;
pub mod gbdt;
pub mod intensity_model;
#[cfg(feature = "xgboost")]
pub mod xgboost;

pub use factory::build_loader;
pub use intensity_model::{IntensityModel, ModelLoader};
