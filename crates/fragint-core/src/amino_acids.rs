//! The fixed amino acid alphabet used for encoding.
//!
//! Leucine is folded into isoleucine: both are isobaric, so `L` never gets an
//! id of its own and is always looked up as `I`.

/// One-letter codes; the index of a code is its encoding id.
pub const AMINO_ACIDS: [char; 19] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V', 'W',
    'Y',
];

/// Monoisotopic residue masses, index-aligned with [`AMINO_ACIDS`].
pub const AMINO_ACID_MASSES: [f64; 19] = [
    71.037114, 103.00919, 115.026943, 129.042593, 147.068414, 57.021464, 137.058912, 113.084064,
    128.094963, 131.040485, 114.042927, 97.052764, 128.058578, 156.101111, 87.032028, 101.047679,
    99.068414, 186.079313, 163.063329,
];

pub const PROTON_MASS: f64 = 1.007825032070059;
pub const WATER_MASS: f64 = 18.0105646837;

/// Fold a residue symbol onto the encoded alphabet (uppercase, `L` → `I`).
#[inline]
pub fn fold(symbol: char) -> char {
    match symbol.to_ascii_uppercase() {
        'L' => 'I',
        other => other,
    }
}

/// Encoding id of a residue symbol, after folding.
pub fn amino_acid_id(symbol: char) -> Option<u16> {
    let folded = fold(symbol);
    AMINO_ACIDS
        .iter()
        .position(|&aa| aa == folded)
        .map(|idx| idx as u16)
}

/// Residue mass for an encoding id, `None` outside the alphabet.
pub fn residue_mass(id: u16) -> Option<f64> {
    AMINO_ACID_MASSES.get(id as usize).copied()
}

/// Render the residue mass table in the layout the native engine reads:
/// one mass per line followed by a terminating `0` line.
pub fn amino_acid_mass_table() -> String {
    let mut table = String::new();
    for mass in AMINO_ACID_MASSES {
        table.push_str(&format!("{}\n", mass));
    }
    table.push_str("0\n");
    table
}
