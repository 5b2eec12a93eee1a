//! PEPREC peptide lists: a header with `spec_id`, `modifications`, `peptide`
//! and `charge` (any order, extra columns ignored), one peptide per row.
//! An optional `mgf_filename` column names the MGF file of each spectrum.
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::{BufRead, BufReader, Chain, Cursor, Read};
use std::path::Path;

use fragint_core::peptide::NO_MODIFICATIONS;
use fragint_core::predictor::PredictionRecord;

const REQUIRED_COLUMNS: [&str; 4] = ["spec_id", "modifications", "peptide", "charge"];

pub const MGF_FILENAME_COLUMN: &str = "mgf_filename";

type PeprecReader = csv::Reader<Chain<Cursor<String>, BufReader<File>>>;

/// Guess the separator from the header line: tab, then comma, then space.
fn detect_delimiter(header: &str) -> u8 {
    if header.contains('\t') {
        b'\t'
    } else if header.contains(',') {
        b','
    } else {
        b' '
    }
}

fn open_peprec(path: &Path) -> Result<(PeprecReader, StringRecord)> {
    let file = File::open(path).with_context(|| format!("Failed to open PEPREC file: {:?}", path))?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    reader
        .read_line(&mut header)
        .with_context(|| format!("Failed to read header of {:?}", path))?;
    let delimiter = detect_delimiter(&header);

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(Cursor::new(header).chain(reader));
    let headers = rdr.headers()?.clone();
    Ok((rdr, headers))
}

fn column_index(headers: &StringRecord, path: &Path, name: &str) -> Result<usize> {
    match headers.iter().position(|h| h.to_lowercase() == name) {
        Some(idx) => Ok(idx),
        None => bail!("PEPREC file {:?} has no '{}' column", path, name),
    }
}

pub fn read_peprec<P: AsRef<Path>>(path: P) -> Result<Vec<PredictionRecord>> {
    let path = path.as_ref();
    let (mut rdr, headers) = open_peprec(path)?;
    let mut columns = [0usize; 4];
    for (slot, name) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = column_index(&headers, path, name)?;
    }
    let [spec_id_col, mods_col, peptide_col, charge_col] = columns;

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        // header is line 1
        let line = row + 2;
        let record = result.with_context(|| format!("Malformed PEPREC line {}", line))?;
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let modifications = match field(mods_col) {
            "" => NO_MODIFICATIONS,
            mods => mods,
        };
        let charge: u32 = field(charge_col).parse().with_context(|| {
            format!(
                "Invalid charge {:?} on PEPREC line {}",
                field(charge_col),
                line
            )
        })?;

        records.push(PredictionRecord::new(
            field(spec_id_col),
            field(peptide_col),
            modifications,
            charge,
        ));
    }
    log::info!("Read {} peptides from {:?}", records.len(), path);
    Ok(records)
}

/// Spectrum ids grouped by their `mgf_filename`, files in order of first
/// appearance.
pub fn read_spectrum_ids_by_file<P: AsRef<Path>>(path: P) -> Result<Vec<(String, Vec<String>)>> {
    let path = path.as_ref();
    let (mut rdr, headers) = open_peprec(path)?;
    let spec_id_col = column_index(&headers, path, "spec_id")?;
    let file_col = column_index(&headers, path, MGF_FILENAME_COLUMN)?;

    let mut runs: Vec<(String, Vec<String>)> = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Malformed PEPREC line {}", row + 2))?;
        let spec_id = record.get(spec_id_col).unwrap_or("").to_string();
        let file = record.get(file_col).unwrap_or("");
        match runs.iter_mut().find(|(name, _)| name == file) {
            Some((_, ids)) => ids.push(spec_id),
            None => runs.push((file.to_string(), vec![spec_id])),
        }
    }
    Ok(runs)
}
