//! Named modifications and the numeric ids they take in an encoded peptide.
//!
//! A [`ModificationRegistry`] owns its own id counter, so two registries never
//! interfere. Ids start right above the space reserved for residues and
//! mutations and are never reused, even when a name is redefined.
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::amino_acids::amino_acid_id;
use crate::error::{FragintError, Result};

/// First id handed out to a modification.
pub const FIRST_MODIFICATION_ID: u16 = 38;

pub const N_TERM_TARGET_ID: i32 = -1;
pub const C_TERM_TARGET_ID: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModCategory {
    Ptm,
    Sptm,
}

impl ModCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModCategory::Ptm => "ptm",
            ModCategory::Sptm => "sptm",
        }
    }
}

impl fmt::Display for ModCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ptm" => Ok(ModCategory::Ptm),
            "sptm" => Ok(ModCategory::Sptm),
            other => Err(format!("Unknown modification category: {}", other)),
        }
    }
}

/// Where a modification may sit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModTarget {
    Residue(char),
    NTerm,
    CTerm,
}

impl ModTarget {
    fn parse(symbol: &str) -> Result<(Self, i32)> {
        match symbol {
            "N-term" => Ok((ModTarget::NTerm, N_TERM_TARGET_ID)),
            "C-term" => Ok((ModTarget::CTerm, C_TERM_TARGET_ID)),
            _ => {
                let mut chars = symbol.chars();
                match (chars.next(), chars.next()) {
                    (Some(aa), None) => amino_acid_id(aa)
                        .map(|id| (ModTarget::Residue(aa), id as i32))
                        .ok_or_else(|| FragintError::invalid_amino_acid(symbol)),
                    _ => Err(FragintError::invalid_amino_acid(symbol)),
                }
            }
        }
    }
}

impl fmt::Display for ModTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModTarget::Residue(aa) => write!(f, "{}", aa),
            ModTarget::NTerm => f.write_str("N-term"),
            ModTarget::CTerm => f.write_str("C-term"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub name: String,
    pub mass_shift: f64,
    /// Optional/fixed flag from the definition; carried along, never interpreted.
    pub flag: String,
    pub target: ModTarget,
    /// Residue id of the target, `-1` for N-term and `-2` for C-term.
    pub target_id: i32,
    pub numeric_id: u16,
    pub category: ModCategory,
}

/// Registered modifications per category plus name lookups spanning all of them.
///
/// Lookups are rebuilt eagerly on every registration, so a read can never see
/// a stale view. Registration takes `&mut self`; shared references are safe to
/// use from many threads.
#[derive(Debug, Clone)]
pub struct ModificationRegistry {
    modifications: HashMap<ModCategory, Vec<Modification>>,
    next_id: u16,
    mass_shifts: HashMap<String, f64>,
    numeric_ids: HashMap<String, u16>,
    by_id: HashMap<u16, (ModCategory, usize)>,
}

impl Default for ModificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModificationRegistry {
    pub fn new() -> Self {
        Self {
            modifications: HashMap::new(),
            next_id: FIRST_MODIFICATION_ID,
            mass_shifts: HashMap::new(),
            numeric_ids: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Register definitions of the form `name,mass_shift,flag,target`, e.g.
    /// `Oxidation,15.994915,opt,M` or `Acetyl,42.010565,opt,N-term`.
    ///
    /// Every definition consumes the next id, in order. The whole call fails on
    /// the first malformed definition; definitions before it stay registered.
    pub fn register<S: AsRef<str>>(
        &mut self,
        modstrings: &[S],
        category: ModCategory,
    ) -> Result<()> {
        let result = modstrings
            .iter()
            .try_for_each(|modstring| self.register_one(modstring.as_ref(), category));
        self.rebuild_lookups();
        result
    }

    fn register_one(&mut self, definition: &str, category: ModCategory) -> Result<()> {
        let fields: Vec<&str> = definition.split(',').map(str::trim).collect();
        let [name, mass_shift, flag, target] = fields[..] else {
            return Err(FragintError::InvalidModificationDefinition {
                definition: definition.to_owned(),
                reason: format!("expected 4 comma separated fields, found {}", fields.len()),
            });
        };
        let mass_shift: f64 =
            mass_shift
                .parse()
                .map_err(|_| FragintError::InvalidModificationDefinition {
                    definition: definition.to_owned(),
                    reason: format!("mass shift {:?} is not a number", mass_shift),
                })?;
        let (target, target_id) = ModTarget::parse(target)?;

        let modification = Modification {
            name: name.to_owned(),
            mass_shift,
            flag: flag.to_owned(),
            target,
            target_id,
            numeric_id: self.next_id,
            category,
        };
        debug!(
            "Registered {} modification {} ({:+.6} Da on {}) as id {}",
            category, modification.name, mass_shift, target, modification.numeric_id
        );
        self.next_id += 1;

        let entries = self.modifications.entry(category).or_default();
        match entries.iter_mut().find(|m| m.name == modification.name) {
            Some(existing) => *existing = modification,
            None => entries.push(modification),
        }
        Ok(())
    }

    fn rebuild_lookups(&mut self) {
        self.mass_shifts.clear();
        self.numeric_ids.clear();
        self.by_id.clear();

        // Insert in id order so the most recent definition of a name wins.
        let mut all: Vec<(ModCategory, usize, &Modification)> = self
            .modifications
            .iter()
            .flat_map(|(&category, mods)| {
                mods.iter()
                    .enumerate()
                    .map(move |(i, m)| (category, i, m))
            })
            .collect();
        all.sort_by_key(|(_, _, m)| m.numeric_id);

        let mut seen_in: HashMap<&str, ModCategory> = HashMap::new();
        for (category, idx, modification) in all {
            if let Some(previous) = seen_in.insert(&modification.name, category) {
                if previous != category {
                    warn!(
                        "Modification {} is defined as both {} and {}; using the {} definition (id {})",
                        modification.name, previous, category, category, modification.numeric_id
                    );
                }
            }
            self.mass_shifts
                .insert(modification.name.clone(), modification.mass_shift);
            self.numeric_ids
                .insert(modification.name.clone(), modification.numeric_id);
            self.by_id.insert(modification.numeric_id, (category, idx));
        }
    }

    pub fn mass_shift(&self, name: &str) -> Result<f64> {
        self.mass_shifts
            .get(name)
            .copied()
            .ok_or_else(|| FragintError::unknown_modification(name))
    }

    pub fn numeric_id(&self, name: &str) -> Result<u16> {
        self.numeric_ids
            .get(name)
            .copied()
            .ok_or_else(|| FragintError::unknown_modification(name))
    }

    /// Reverse lookup from an encoded id to its definition.
    pub fn by_numeric_id(&self, id: u16) -> Option<&Modification> {
        let &(category, idx) = self.by_id.get(&id)?;
        self.modifications.get(&category)?.get(idx)
    }

    pub fn get(&self, category: ModCategory, name: &str) -> Option<&Modification> {
        self.modifications
            .get(&category)?
            .iter()
            .find(|m| m.name == name)
    }

    /// All registered modifications, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Modification> {
        let mut all: Vec<&Modification> = self.modifications.values().flatten().collect();
        all.sort_by_key(|m| m.numeric_id);
        all.into_iter()
    }

    pub fn len(&self) -> usize {
        self.modifications.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render one category in the native engine's table layout: the entry
    /// count, then `mass_shift,1,target_id,numeric_id` per modification.
    pub fn engine_table(&self, category: ModCategory) -> String {
        let mods = self
            .modifications
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let mut table = format!("{}\n", mods.len());
        for m in mods {
            table.push_str(&format!(
                "{},1,{},{}\n",
                m.mass_shift, m.target_id, m.numeric_id
            ));
        }
        table
    }
}
