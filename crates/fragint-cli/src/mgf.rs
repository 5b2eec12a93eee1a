//! Extract the spectra named in a PEPREC file from an MGF file, or from a
//! directory of MGF files chosen per spectrum by the `mgf_filename` column.
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    /// Spectra written to the output.
    pub found: usize,
    /// Spectrum ids asked for.
    pub requested: usize,
    pub output: PathBuf,
}

/// `<dir>/<stem>_scanned.mgf` next to the input file or directory.
pub fn scanned_path(mgf_path: &Path) -> PathBuf {
    let stem = mgf_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    mgf_path.with_file_name(format!("{}_scanned.mgf", stem))
}

/// Peak lines with an intensity of zero carry no signal.
fn is_zero_intensity_peak(line: &str) -> bool {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(mz), Some(intensity)) => {
            mz.parse::<f64>().is_ok() && intensity.parse::<f64>().map_or(false, |i| i == 0.0)
        }
        _ => false,
    }
}

/// File name of a run in the `mgf_filename` column; `.mgf` is appended
/// unless already there.
pub fn mgf_file_name(run: &str) -> String {
    if run.ends_with(".mgf") || run.ends_with(".MGF") {
        run.to_string()
    } else {
        format!("{}.mgf", run)
    }
}

/// Copy every spectrum whose `TITLE` is in `titles` to `output`, dropping
/// zero-intensity peaks. Returns the number of spectra written.
pub fn scan_mgf(mgf_path: &Path, titles: &HashSet<String>, output: &Path) -> Result<usize> {
    let mut writer = create_output(output)?;
    let found = scan_into(mgf_path, titles, &mut writer)?;
    writer.flush()?;
    Ok(found)
}

fn create_output(output: &Path) -> Result<BufWriter<File>> {
    let out = File::create(output)
        .with_context(|| format!("Failed to create output file: {:?}", output))?;
    Ok(BufWriter::new(out))
}

fn scan_into<W: Write>(
    mgf_path: &Path,
    titles: &HashSet<String>,
    writer: &mut W,
) -> Result<usize> {
    let file = File::open(mgf_path)
        .with_context(|| format!("Failed to open MGF file: {:?}", mgf_path))?;

    let mut block: Vec<String> = Vec::new();
    let mut in_block = false;
    let mut keep = false;
    let mut found = 0;

    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read {:?}", mgf_path))?;
        let trimmed = line.trim_end();
        if trimmed == "BEGIN IONS" {
            block.clear();
            in_block = true;
            keep = false;
        } else if trimmed == "END IONS" {
            if in_block && keep {
                writeln!(writer, "BEGIN IONS")?;
                for kept in &block {
                    writeln!(writer, "{}", kept)?;
                }
                writeln!(writer, "END IONS\n")?;
                found += 1;
            }
            in_block = false;
        } else if in_block {
            if let Some(title) = trimmed.strip_prefix("TITLE=") {
                keep = titles.contains(title.trim());
            }
            if !is_zero_intensity_peak(trimmed) {
                block.push(trimmed.to_string());
            }
        }
    }
    Ok(found)
}

/// Scan `mgf_path` for the spectrum ids of a PEPREC file. A directory is
/// scanned file by file, following the PEPREC `mgf_filename` column.
pub fn scan_mgf_for_peprec(mgf_path: &Path, peprec_path: &Path) -> Result<ScanSummary> {
    if mgf_path.is_dir() {
        scan_mgf_dir_for_peprec(mgf_path, peprec_path)
    } else {
        scan_mgf_file_for_peprec(mgf_path, peprec_path)
    }
}

/// Scan every MGF file named in the PEPREC `mgf_filename` column under
/// `mgf_dir` into one `<mgf_dir>_scanned.mgf`.
pub fn scan_mgf_dir_for_peprec(mgf_dir: &Path, peprec_path: &Path) -> Result<ScanSummary> {
    let runs = crate::peprec::read_spectrum_ids_by_file(peprec_path)?;
    let output = scanned_path(mgf_dir);
    let mut writer = create_output(&output)?;
    log::info!("Scanning {} MGF files in {:?}", runs.len(), mgf_dir);

    let mut found = 0;
    let mut requested = 0;
    for (run, spectrum_ids) in runs {
        let titles: HashSet<String> = spectrum_ids.into_iter().collect();
        let mgf_path = mgf_dir.join(mgf_file_name(&run));
        let run_found = scan_into(&mgf_path, &titles, &mut writer)?;
        log::debug!("{}/{} spectra found in {:?}", run_found, titles.len(), mgf_path);
        found += run_found;
        requested += titles.len();
    }
    writer.flush()?;

    log::info!(
        "{}/{} spectra found and written to {:?}",
        found,
        requested,
        output
    );
    Ok(ScanSummary {
        found,
        requested,
        output,
    })
}

fn scan_mgf_file_for_peprec(mgf_path: &Path, peprec_path: &Path) -> Result<ScanSummary> {
    let titles: HashSet<String> = crate::peprec::read_peprec(peprec_path)?
        .into_iter()
        .map(|record| record.spectrum_id)
        .collect();
    let output = scanned_path(mgf_path);
    let found = scan_mgf(mgf_path, &titles, &output)?;
    log::info!(
        "{}/{} spectra found and written to {:?}",
        found,
        titles.len(),
        output
    );
    Ok(ScanSummary {
        found,
        requested: titles.len(),
        output,
    })
}
