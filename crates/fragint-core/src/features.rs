//! Per-cleavage feature rows and fragment m/z values.
//!
//! [`FeatureVectorBuilder`] is the seam to whatever engine computes model
//! inputs. The contract: one row per backbone cleavage (`len - 1` rows) and
//! one m/z array of `len - 1` values per requested ion type, where index `k`
//! of an array holds ion number `k + 1` of that series.
use crate::amino_acids::{residue_mass, AMINO_ACIDS, PROTON_MASS, WATER_MASS};
use crate::config::FeatureLayout;
use crate::error::{FragintError, Result};
use crate::ion_types::IonType;
use crate::math::Array2;
use crate::modifications::ModificationRegistry;
use crate::peptide::EncodedPeptide;

const CO_MASS: f64 = 27.9949146;
const NH3_MASS: f64 = 17.0265491;
const X_ION_OFFSET: f64 = 25.9792649;
const Z_ION_OFFSET: f64 = -16.0187241;

/// Columns produced by [`BasicFeatureBuilder`].
pub const BASIC_FEATURE_COUNT: usize = 10 + 2 * AMINO_ACIDS.len();

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentFeatures {
    /// One row per cleavage site, N-terminal site first.
    pub rows: Array2<f32>,
    /// One array per requested ion type, in request order.
    pub mz: Vec<Vec<f32>>,
}

pub trait FeatureVectorBuilder: Sync {
    fn build(
        &self,
        unmodified: &EncodedPeptide,
        modified: &EncodedPeptide,
        charge: u32,
        ion_types: &[IonType],
    ) -> Result<FragmentFeatures>;

    /// Layout of the rows this builder emits.
    fn layout(&self) -> FeatureLayout;
}

/// Feature builder computing exact fragment m/z values and a compact
/// composition-based feature layout.
///
/// Row layout per cleavage after residue `i`:
/// `[i, len, charge, n_fragment_mass, c_fragment_mass, i / len,
///   left_slot_id, right_slot_id, n_term_slot_id, c_term_slot_id,
///   n_fragment_composition[19], c_fragment_composition[19]]`.
#[derive(Debug, Clone, Copy)]
pub struct BasicFeatureBuilder<'a> {
    registry: &'a ModificationRegistry,
}

impl<'a> BasicFeatureBuilder<'a> {
    pub fn new(registry: &'a ModificationRegistry) -> Self {
        Self { registry }
    }

    /// Mass of every slot, terminal slots included, with modifications applied.
    fn slot_masses(
        &self,
        unmodified: &EncodedPeptide,
        modified: &EncodedPeptide,
    ) -> Result<Vec<f64>> {
        let last = unmodified.len() - 1;
        unmodified
            .iter()
            .zip(modified.iter())
            .enumerate()
            .map(|(pos, (&base, &id))| {
                let base_mass = if pos == 0 || pos == last {
                    0.0
                } else {
                    residue_mass(base).ok_or_else(|| FragintError::invalid_amino_acid(base))?
                };
                if id == base {
                    return Ok(base_mass);
                }
                match self.registry.by_numeric_id(id) {
                    Some(modification) => Ok(base_mass + modification.mass_shift),
                    // A residue id in a residue slot is a substitution.
                    None => residue_mass(id)
                        .filter(|_| pos != 0 && pos != last)
                        .ok_or_else(|| FragintError::unknown_modification(&id.to_string())),
                }
            })
            .collect()
    }
}

impl FeatureVectorBuilder for BasicFeatureBuilder<'_> {
    fn layout(&self) -> FeatureLayout {
        FeatureLayout::Basic
    }

    fn build(
        &self,
        unmodified: &EncodedPeptide,
        modified: &EncodedPeptide,
        charge: u32,
        ion_types: &[IonType],
    ) -> Result<FragmentFeatures> {
        if unmodified.len() != modified.len() {
            return Err(FragintError::FeatureContract {
                peptide: format!("{:?}", unmodified.as_slice()),
                reason: format!(
                    "modified encoding has {} slots, unmodified has {}",
                    modified.len(),
                    unmodified.len()
                ),
            });
        }
        let len = unmodified.peptide_len();
        let masses = self.slot_masses(unmodified, modified)?;

        // prefix[i]: N-terminal slot plus the first i residues
        // suffix[k]: C-terminal slot plus the last k residues
        let mut prefix = vec![0.0; len + 1];
        let mut suffix = vec![0.0; len + 1];
        prefix[0] = masses[0];
        suffix[0] = masses[len + 1];
        for i in 1..=len {
            prefix[i] = prefix[i - 1] + masses[i];
            suffix[i] = suffix[i - 1] + masses[len + 1 - i];
        }

        let mut data = Vec::with_capacity((len - 1) * BASIC_FEATURE_COUNT);
        for i in 1..len {
            let n_mass = prefix[i];
            let c_mass = suffix[len - i];
            data.extend_from_slice(&[
                i as f32,
                len as f32,
                charge as f32,
                n_mass as f32,
                c_mass as f32,
                i as f32 / len as f32,
                modified[i] as f32,
                modified[i + 1] as f32,
                modified.n_term() as f32,
                modified.c_term() as f32,
            ]);
            let mut n_counts = [0.0f32; AMINO_ACIDS.len()];
            let mut c_counts = [0.0f32; AMINO_ACIDS.len()];
            for (pos, &id) in unmodified.residues().iter().enumerate() {
                if pos < i {
                    n_counts[id as usize] += 1.0;
                } else {
                    c_counts[id as usize] += 1.0;
                }
            }
            data.extend_from_slice(&n_counts);
            data.extend_from_slice(&c_counts);
        }
        let rows = Array2::from_shape_vec((len - 1, BASIC_FEATURE_COUNT), data).map_err(|e| {
            FragintError::FeatureContract {
                peptide: format!("{:?}", unmodified.as_slice()),
                reason: e.to_string(),
            }
        })?;

        let mz = ion_types
            .iter()
            .map(|ion_type| {
                (1..len)
                    .map(|number| {
                        let b = prefix[number] + PROTON_MASS;
                        let y = suffix[number] + WATER_MASS + PROTON_MASS;
                        let mz = match ion_type {
                            IonType::A => b - CO_MASS,
                            IonType::B => b,
                            IonType::C => b + NH3_MASS,
                            IonType::X => y + X_ION_OFFSET,
                            IonType::Y => y,
                            IonType::Z => y + Z_ION_OFFSET,
                        };
                        mz as f32
                    })
                    .collect()
            })
            .collect();

        Ok(FragmentFeatures { rows, mz })
    }
}
