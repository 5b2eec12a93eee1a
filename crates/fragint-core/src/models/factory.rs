use crate::config::ModelBackend;
use crate::error::Result;
use crate::models::intensity_model::ModelLoader;

/// Build the model loader for a backend.
pub fn build_loader(backend: ModelBackend) -> Result<Box<dyn ModelLoader>> {
    match backend {
        ModelBackend::Gbdt => Ok(Box::new(crate::models::gbdt::GbdtLoader)),

        #[cfg(feature = "xgboost")]
        ModelBackend::Xgboost => Ok(Box::new(crate::models::xgboost::XgboostLoader)),

        #[cfg(not(feature = "xgboost"))]
        ModelBackend::Xgboost => Err(crate::error::FragintError::invalid_model(
            "xgboost",
            "this build has no XGBoost backend, compile with `--features xgboost`",
        )),
    }
}
