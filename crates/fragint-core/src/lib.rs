//! fragint-core: peptide encoding and fragment-ion intensity prediction.
//!
//! The crate turns a peptide, its modification string and a precursor charge
//! into a validated numeric encoding, per-cleavage feature rows and, with one
//! gradient boosted model per ion type, predicted fragment intensities.
//!
//! Native inference backends sit behind feature flags so the default build
//! needs no system libraries (`xgboost` enables libxgboost boosters).
pub mod amino_acids;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod features;
pub mod ion_types;
pub mod mass;
pub mod math;
pub mod models;
pub mod modifications;
pub mod peptide;
pub mod predictor;

pub use error::{FragintError, Result};
