//! Batch prediction: encode and featurize records in parallel, run one
//! inference pass per ion type, then cut the flat predictions back into
//! per-peptide arrays.
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Instant;

use crate::artifacts::ModelArtifactManager;
use crate::config::ModelSet;
use crate::error::{FragintError, Result};
use crate::features::{FeatureVectorBuilder, FragmentFeatures};
use crate::ion_types::IonType;
use crate::math::Array2;
use crate::models::ModelLoader;
use crate::modifications::ModificationRegistry;
use crate::peptide::{apply_modifications, encode_peptide};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub peptide: String,
    pub modifications: String,
    pub charge: u32,
    pub spectrum_id: String,
}

impl PredictionRecord {
    pub fn new(
        spectrum_id: impl Into<String>,
        peptide: impl Into<String>,
        modifications: impl Into<String>,
        charge: u32,
    ) -> Self {
        Self {
            peptide: peptide.into(),
            modifications: modifications.into(),
            charge,
            spectrum_id: spectrum_id.into(),
        }
    }
}

/// Predictions for a batch, one entry per record in input order.
///
/// `mz_arrays[r][t]` and `intensities[r][t]` hold ion type `ion_types[t]` of
/// record `r`; index `k` of either array is ion number `k + 1` of that series.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionBatch {
    pub ion_types: Vec<IonType>,
    pub spectrum_ids: Vec<String>,
    pub peptide_lengths: Vec<usize>,
    pub charges: Vec<u32>,
    pub mz_arrays: Vec<Vec<Vec<f32>>>,
    pub intensities: Vec<Vec<Vec<f32>>>,
}

impl PredictionBatch {
    pub fn len(&self) -> usize {
        self.spectrum_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum_ids.is_empty()
    }
}

struct Featurized {
    peptide_len: usize,
    features: FragmentFeatures,
}

pub struct BatchPredictor<'a> {
    registry: &'a ModificationRegistry,
    artifacts: &'a ModelArtifactManager,
    builder: &'a dyn FeatureVectorBuilder,
    loader: &'a dyn ModelLoader,
    pool: Option<ThreadPool>,
}

impl<'a> BatchPredictor<'a> {
    pub fn new(
        registry: &'a ModificationRegistry,
        artifacts: &'a ModelArtifactManager,
        builder: &'a dyn FeatureVectorBuilder,
        loader: &'a dyn ModelLoader,
    ) -> Self {
        Self {
            registry,
            artifacts,
            builder,
            loader,
            pool: None,
        }
    }

    /// Featurize on a dedicated pool of `num_threads` workers instead of
    /// rayon's global pool.
    pub fn with_num_threads(mut self, num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(io::Error::other)?;
        self.pool = Some(pool);
        Ok(self)
    }

    /// Predict with a model set after checking that its file format and
    /// feature layout match this predictor's loader and builder. A mismatch
    /// fails before any model file is fetched.
    pub fn predict_model_set(
        &self,
        records: &[PredictionRecord],
        models: &ModelSet,
    ) -> Result<PredictionBatch> {
        models.check_compatible(self.loader.format(), self.builder.layout())?;
        let ion_type_models: Vec<(&str, &str)> = models
            .ion_type_models
            .iter()
            .map(|(ion_type, file)| (ion_type.as_str(), file.as_str()))
            .collect();
        self.predict_batch(records, &ion_type_models)
    }

    /// Predict intensities for every record with one model per ion type.
    ///
    /// `ion_type_models` pairs an ion type (`a b c x y z`) with the logical
    /// name of its model file; output arrays follow its order. Any failure
    /// aborts the whole batch.
    pub fn predict_batch<I, M>(
        &self,
        records: &[PredictionRecord],
        ion_type_models: &[(I, M)],
    ) -> Result<PredictionBatch>
    where
        I: AsRef<str>,
        M: AsRef<str>,
    {
        let ion_types = ion_type_models
            .iter()
            .map(|(ion_type, _)| ion_type.as_ref().parse::<IonType>())
            .collect::<Result<Vec<_>>>()?;

        if records.is_empty() {
            return Ok(PredictionBatch {
                ion_types,
                ..Default::default()
            });
        }

        let start = Instant::now();
        let featurized = self.featurize_all(records, &ion_types)?;
        debug!(
            "Featurized {} peptides in {:?}",
            records.len(),
            start.elapsed()
        );

        let peptide_lengths: Vec<usize> = featurized.iter().map(|f| f.peptide_len).collect();
        let row_counts: Vec<usize> = peptide_lengths.iter().map(|len| len - 1).collect();
        let mut blocks = Vec::with_capacity(featurized.len());
        let mut mz_arrays = Vec::with_capacity(featurized.len());
        for item in featurized {
            blocks.push(item.features.rows);
            mz_arrays.push(item.features.mz);
        }
        let matrix = Array2::vstack(&blocks).map_err(|e| FragintError::FeatureContract {
            peptide: "<batch>".to_string(),
            reason: e.to_string(),
        })?;
        drop(blocks);
        info!(
            "Feature matrix for {} peptides: {} rows x {} columns",
            records.len(),
            matrix.nrows(),
            matrix.ncols()
        );

        // Every model file is verified before the first inference pass.
        let model_paths = ion_type_models
            .iter()
            .map(|(_, name)| self.artifacts.ensure_present(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut per_ion: Vec<Vec<Vec<f32>>> = Vec::with_capacity(ion_types.len());
        let passes = ion_types.iter().zip(ion_type_models).zip(&model_paths);
        for ((ion_type, (_, name)), path) in passes {
            let name = name.as_ref();
            let pass_start = Instant::now();
            let model = self.loader.load(path, name)?;
            let flat = model.predict(&matrix)?;
            if flat.len() != matrix.nrows() {
                return Err(FragintError::invalid_model(
                    name,
                    format!(
                        "returned {} predictions for {} rows",
                        flat.len(),
                        matrix.nrows()
                    ),
                ));
            }
            let mut split = split_by_lengths(&flat, &row_counts);
            if ion_type.is_c_terminal() {
                split.iter_mut().for_each(|values| values.reverse());
            }
            debug!(
                "Predicted {} ions with {} in {:?}",
                ion_type,
                model.name(),
                pass_start.elapsed()
            );
            per_ion.push(split);
        }

        let mut intensities: Vec<Vec<Vec<f32>>> =
            (0..records.len()).map(|_| Vec::with_capacity(ion_types.len())).collect();
        for split in per_ion {
            for (record_intensities, values) in intensities.iter_mut().zip(split) {
                record_intensities.push(values);
            }
        }

        info!(
            "Predicted {} peptides for ion types [{}] in {:?}",
            records.len(),
            ion_types
                .iter()
                .map(IonType::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            start.elapsed()
        );

        Ok(PredictionBatch {
            ion_types,
            spectrum_ids: records.iter().map(|r| r.spectrum_id.clone()).collect(),
            peptide_lengths,
            charges: records.iter().map(|r| r.charge).collect(),
            mz_arrays,
            intensities,
        })
    }

    fn featurize_all(
        &self,
        records: &[PredictionRecord],
        ion_types: &[IonType],
    ) -> Result<Vec<Featurized>> {
        let registry = self.registry;
        let builder = self.builder;
        let work = || {
            records
                .par_iter()
                .map(|record| featurize(record, registry, builder, ion_types))
                .collect::<Result<Vec<_>>>()
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

fn featurize(
    record: &PredictionRecord,
    registry: &ModificationRegistry,
    builder: &dyn FeatureVectorBuilder,
    ion_types: &[IonType],
) -> Result<Featurized> {
    let result = encode_peptide(&record.peptide).and_then(|encoded| {
        let modified = apply_modifications(&encoded, &record.modifications, registry)?;
        let features = builder.build(&encoded, &modified, record.charge, ion_types)?;
        check_contract(record, encoded.peptide_len(), &features, ion_types.len())?;
        Ok(Featurized {
            peptide_len: encoded.peptide_len(),
            features,
        })
    });
    if let Err(e) = &result {
        warn!("Cannot featurize spectrum {}: {}", record.spectrum_id, e);
    }
    result
}

fn check_contract(
    record: &PredictionRecord,
    peptide_len: usize,
    features: &FragmentFeatures,
    n_ion_types: usize,
) -> Result<()> {
    let expected = peptide_len - 1;
    let broken = |reason: String| FragintError::FeatureContract {
        peptide: record.peptide.clone(),
        reason,
    };
    if features.rows.nrows() != expected {
        return Err(broken(format!(
            "expected {} feature rows, got {}",
            expected,
            features.rows.nrows()
        )));
    }
    if features.mz.len() != n_ion_types {
        return Err(broken(format!(
            "expected {} m/z arrays, got {}",
            n_ion_types,
            features.mz.len()
        )));
    }
    if let Some(bad) = features.mz.iter().find(|mz| mz.len() != expected) {
        return Err(broken(format!(
            "expected {} m/z values per ion type, got {}",
            expected,
            bad.len()
        )));
    }
    Ok(())
}

/// Cut `flat` into consecutive pieces of the given lengths.
fn split_by_lengths(flat: &[f32], lengths: &[usize]) -> Vec<Vec<f32>> {
    let mut rest = flat;
    lengths
        .iter()
        .map(|&n| {
            let (head, tail) = rest.split_at(n);
            rest = tail;
            head.to_vec()
        })
        .collect()
}
