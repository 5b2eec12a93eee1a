use thiserror::Error;

pub type Result<T, E = FragintError> = std::result::Result<T, E>;

/// Every way the prediction core can fail.
///
/// Input validation errors are caller-attributable and never retried, model
/// errors are fatal for the current batch, and `Download`/`Io` are transient.
#[derive(Debug, Error)]
pub enum FragintError {
    #[error("invalid peptide {peptide:?}: {reason}")]
    InvalidPeptide { peptide: String, reason: String },

    #[error("unsupported amino acid {symbol:?}")]
    InvalidAminoAcid { symbol: String },

    #[error("invalid modification string {modifications:?}: {reason}")]
    InvalidModificationFormatting {
        modifications: String,
        reason: String,
    },

    #[error("invalid modification definition {definition:?}: {reason}")]
    InvalidModificationDefinition { definition: String, reason: String },

    #[error("unknown modification {name:?}")]
    UnknownModification { name: String },

    #[error("unsupported ion type {ion_type:?} (expected one of a, b, c, x, y, z)")]
    UnsupportedIonType { ion_type: String },

    #[error("invalid precursor charge {charge}")]
    InvalidCharge { charge: u32 },

    #[error("invalid model {name:?}: {reason}")]
    InvalidModel { name: String, reason: String },

    #[error("models {models} cannot be used here: {reason}")]
    IncompatibleModels { models: String, reason: String },

    #[error("unknown fragmentation model {name:?}")]
    UnknownFragmentationModel { name: String },

    #[error("feature builder broke its contract for {peptide:?}: {reason}")]
    FeatureContract { peptide: String, reason: String },

    #[error("could not download {name:?} from {url}: {reason}")]
    Download {
        name: String,
        url: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FragintError {
    pub(crate) fn invalid_peptide(peptide: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPeptide {
            peptide: peptide.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_amino_acid(symbol: impl ToString) -> Self {
        Self::InvalidAminoAcid {
            symbol: symbol.to_string(),
        }
    }

    pub(crate) fn invalid_formatting(modifications: &str, reason: impl Into<String>) -> Self {
        Self::InvalidModificationFormatting {
            modifications: modifications.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_modification(name: &str) -> Self {
        Self::UnknownModification {
            name: name.to_owned(),
        }
    }

    pub(crate) fn invalid_model(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidModel {
            name: name.to_owned(),
            reason: reason.into(),
        }
    }

    /// True for errors a caller may reasonably retry (network or filesystem hiccups).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::Io(_))
    }
}
