//! Peptide encoding and modification application.
//!
//! An encoded peptide is the residue id sequence framed by two terminal slots.
//! Slot `0` is the N-terminus, slot `len + 1` the C-terminus; both hold `0`
//! until a terminal modification overwrites them.
use std::borrow::Cow;
use std::ops::Deref;

use crate::amino_acids::{amino_acid_id, fold};
use crate::error::{FragintError, Result};
use crate::modifications::ModificationRegistry;

pub const MIN_PEPTIDE_LENGTH: usize = 4;
/// The native fragmentation engine crashes on anything longer.
pub const MAX_PEPTIDE_LENGTH: usize = 100;

/// Marker for "no modifications" in a modification string.
pub const NO_MODIFICATIONS: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedPeptide(Vec<u16>);

impl EncodedPeptide {
    /// Number of residues, excluding the terminal slots.
    pub fn peptide_len(&self) -> usize {
        self.0.len() - 2
    }

    pub fn n_term(&self) -> u16 {
        self.0[0]
    }

    pub fn c_term(&self) -> u16 {
        self.0[self.0.len() - 1]
    }

    /// Residue slots `1..=len`.
    pub fn residues(&self) -> &[u16] {
        &self.0[1..self.0.len() - 1]
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u16> {
        self.0
    }
}

impl Deref for EncodedPeptide {
    type Target = [u16];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Strip a peptide to the encoded alphabet: uppercase with `L` folded to `I`.
pub fn normalize_peptide(peptide: &str) -> String {
    peptide.chars().map(fold).collect()
}

/// Encode a stripped peptide as residue ids framed by two zero terminal slots.
///
/// # Example
/// ```
/// use fragint_core::peptide::encode_peptide;
///
/// let encoded = encode_peptide("PEPTLDE").unwrap();
/// assert_eq!(encoded.as_slice(), &[0, 11, 3, 11, 15, 7, 2, 3, 0]);
/// ```
pub fn encode_peptide(peptide: &str) -> Result<EncodedPeptide> {
    let normalized = normalize_peptide(peptide);
    let len = normalized.chars().count();
    if len > MAX_PEPTIDE_LENGTH {
        return Err(FragintError::invalid_peptide(
            peptide,
            format!(
                "peptide sequence cannot be longer than {} amino acids",
                MAX_PEPTIDE_LENGTH
            ),
        ));
    }
    if len < MIN_PEPTIDE_LENGTH {
        return Err(FragintError::invalid_peptide(
            peptide,
            format!(
                "peptide sequence cannot be shorter than {} amino acids",
                MIN_PEPTIDE_LENGTH
            ),
        ));
    }

    let mut encoded = Vec::with_capacity(len + 2);
    encoded.push(0);
    for symbol in normalized.chars() {
        let id = amino_acid_id(symbol).ok_or_else(|| FragintError::invalid_amino_acid(symbol))?;
        encoded.push(id);
    }
    encoded.push(0);
    Ok(EncodedPeptide(encoded))
}

/// True when a modification string carries no modifications.
pub fn is_unmodified(modifications: &str) -> bool {
    let trimmed = modifications.trim();
    trimmed.is_empty() || trimmed == NO_MODIFICATIONS
}

/// Split a `position|name|position|name` string into its pairs.
///
/// Returns no pairs for an empty string or `-`.
pub fn parse_modifications(modifications: &str) -> Result<Vec<(usize, &str)>> {
    if is_unmodified(modifications) {
        return Ok(Vec::new());
    }
    let tokens: Vec<&str> = modifications.trim().split('|').collect();
    if tokens.len() % 2 != 0 {
        return Err(FragintError::invalid_formatting(
            modifications,
            format!("expected position|name pairs, found {} tokens", tokens.len()),
        ));
    }
    tokens
        .chunks_exact(2)
        .map(|pair| {
            let position = pair[0].trim().parse::<usize>().map_err(|_| {
                FragintError::invalid_formatting(
                    modifications,
                    format!("position {:?} is not a non-negative integer", pair[0]),
                )
            })?;
            Ok((position, pair[1].trim()))
        })
        .collect()
}

/// Modification names in a modification string, ignoring positions.
pub fn modification_names(modifications: &str) -> impl Iterator<Item = &str> {
    let body = if is_unmodified(modifications) {
        ""
    } else {
        modifications.trim()
    };
    body.split('|')
        .skip(1)
        .step_by(2)
        .map(str::trim)
}

/// Overwrite the slots named in `modifications` with modification ids.
///
/// The input is never touched: an unmodified string hands the input back
/// borrowed, anything else works on a copy. Positions must lie in
/// `0..=len + 1`.
pub fn apply_modifications<'a>(
    encoded: &'a EncodedPeptide,
    modifications: &str,
    registry: &ModificationRegistry,
) -> Result<Cow<'a, EncodedPeptide>> {
    if is_unmodified(modifications) {
        return Ok(Cow::Borrowed(encoded));
    }

    let mut modified = encoded.clone();
    for (position, name) in parse_modifications(modifications)? {
        let id = registry.numeric_id(name)?;
        let slot = modified.0.get_mut(position).ok_or_else(|| {
            FragintError::invalid_formatting(
                modifications,
                format!(
                    "position {} is outside the peptide (0..={})",
                    position,
                    encoded.peptide_len() + 1
                ),
            )
        })?;
        *slot = id;
    }
    Ok(Cow::Owned(modified))
}
