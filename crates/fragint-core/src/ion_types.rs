use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FragintError;

/// Backbone fragment ion series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IonType {
    A,
    B,
    C,
    X,
    Y,
    Z,
}

impl IonType {
    pub const ALL: [IonType; 6] = [
        IonType::A,
        IonType::B,
        IonType::C,
        IonType::X,
        IonType::Y,
        IonType::Z,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IonType::A => "a",
            IonType::B => "b",
            IonType::C => "c",
            IonType::X => "x",
            IonType::Y => "y",
            IonType::Z => "z",
        }
    }

    /// Series counted from the C-terminus (`x`, `y`, `z`).
    pub fn is_c_terminal(&self) -> bool {
        matches!(self, IonType::X | IonType::Y | IonType::Z)
    }
}

impl fmt::Display for IonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IonType {
    type Err = FragintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(IonType::A),
            "b" => Ok(IonType::B),
            "c" => Ok(IonType::C),
            "x" => Ok(IonType::X),
            "y" => Ok(IonType::Y),
            "z" => Ok(IonType::Z),
            _ => Err(FragintError::UnsupportedIonType {
                ion_type: s.to_owned(),
            }),
        }
    }
}
