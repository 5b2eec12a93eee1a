use crate::amino_acids::{amino_acid_id, residue_mass, PROTON_MASS, WATER_MASS};
use crate::error::{FragintError, Result};
use crate::modifications::ModificationRegistry;
use crate::peptide::modification_names;

/// Monoisotopic mass of an unmodified peptide: residue masses plus water.
pub fn peptide_mass(peptide: &str) -> Result<f64> {
    peptide.chars().try_fold(WATER_MASS, |mass, symbol| {
        amino_acid_id(symbol)
            .and_then(residue_mass)
            .map(|residue| mass + residue)
            .ok_or_else(|| FragintError::invalid_amino_acid(symbol))
    })
}

/// Mass-to-charge ratio of a neutral mass carrying `charge` protons.
pub fn mass_to_mz(mass: f64, charge: u32) -> Result<f64> {
    if charge == 0 {
        return Err(FragintError::InvalidCharge { charge });
    }
    let charge = charge as f64;
    Ok((mass + charge * PROTON_MASS) / charge)
}

impl ModificationRegistry {
    /// Precursor mass and m/z for a peptide with modifications.
    ///
    /// Mass shifts are summed over the names in the modification string;
    /// positions are ignored, so pair order never matters.
    ///
    /// # Example
    /// ```
    /// use fragint_core::modifications::{ModCategory, ModificationRegistry};
    ///
    /// let mut registry = ModificationRegistry::new();
    /// registry.register(&["Oxidation,15.994915,opt,M"], ModCategory::Ptm).unwrap();
    /// let (mass, mz) = registry.precursor_mass_and_mz("PEPTMDE", "5|Oxidation", 2).unwrap();
    /// assert!(mz < mass);
    /// ```
    pub fn precursor_mass_and_mz(
        &self,
        peptide: &str,
        modifications: &str,
        charge: u32,
    ) -> Result<(f64, f64)> {
        let unmodified = peptide_mass(peptide)?;
        let shifts = modification_names(modifications)
            .map(|name| self.mass_shift(name))
            .sum::<Result<f64>>()?;
        let mass = unmodified + shifts;
        Ok((mass, mass_to_mz(mass, charge)?))
    }
}
