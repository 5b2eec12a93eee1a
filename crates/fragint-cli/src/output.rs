use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use fragint_core::predictor::PredictionBatch;

/// Path of the predictions file for an output prefix.
pub fn predictions_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{}_predictions.csv", prefix))
}

/// Write one row per predicted ion to `<prefix>_predictions.csv`.
///
/// Columns: `spec_id,charge,ion,ionnumber,mz,prediction`, with ion numbers
/// counted from 1 within their series.
pub fn write_predictions(batch: &PredictionBatch, prefix: &str) -> Result<PathBuf> {
    let path = predictions_path(prefix);
    write_predictions_to(batch, &path)?;
    Ok(path)
}

pub fn write_predictions_to<P: AsRef<Path>>(
    batch: &PredictionBatch,
    output_path: P,
) -> Result<()> {
    let path = output_path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut writer = csv::WriterBuilder::new().from_writer(BufWriter::new(file));

    writer.write_record(["spec_id", "charge", "ion", "ionnumber", "mz", "prediction"])?;

    let mut rows = 0usize;
    for record in 0..batch.len() {
        let spec_id = &batch.spectrum_ids[record];
        let charge = batch.charges[record].to_string();
        for (t, ion_type) in batch.ion_types.iter().enumerate() {
            let ion = ion_type.as_str().to_uppercase();
            let mzs = &batch.mz_arrays[record][t];
            let predictions = &batch.intensities[record][t];
            for (k, (mz, prediction)) in mzs.iter().zip(predictions).enumerate() {
                let ion_number = (k + 1).to_string();
                let mz = format!("{:.4}", mz);
                let prediction = format!("{:.6}", prediction);
                writer.write_record([
                    spec_id.as_str(),
                    charge.as_str(),
                    ion.as_str(),
                    ion_number.as_str(),
                    mz.as_str(),
                    prediction.as_str(),
                ])?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    log::info!("Wrote {} predicted ions to {:?}", rows, path);
    Ok(())
}
