use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use fragint_cli::config::PredictionConfig;
use fragint_cli::mgf::scan_mgf_for_peprec;
use fragint_cli::predict::run_prediction;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("FRAGINT_LOG", "error,fragint=info"))
        .init();

    let matches = Command::new("fragint")
        .version(clap::crate_version!())
        .about("fragint - fragment-ion intensity prediction for peptides")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("predict-batch")
                .about("Predict fragment-ion intensities for every peptide in a PEPREC file")
                .arg(
                    Arg::new("peprec")
                        .help("Path to the PEPREC file with spec_id, modifications, peptide and charge columns")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("config")
                        .help("Path to a JSON configuration file. Defaults are used when omitted.")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help(
                            "Output prefix; predictions are written to <prefix>_predictions.csv. \
                             Overrides the output_file specified in the configuration file.",
                        )
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .help("Fragmentation model preset. Overrides the model in the configuration file.")
                        .value_parser(["HCD2021", "Immuno-HCD"]),
                )
                .arg(
                    Arg::new("model_dir")
                        .long("model-dir")
                        .help("Directory holding (or receiving) the model files")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("model_backend")
                        .long("backend")
                        .help("Inference backend. Overrides model_backend in the configuration file.")
                        .value_parser(["gbdt", "xgboost"]),
                )
                .arg(
                    Arg::new("processes")
                        .short('n')
                        .long("num-cpu")
                        .help("Number of worker threads for featurization")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("scan-mgf")
                .about("Copy the spectra listed in a PEPREC file from MGF files to <mgf>_scanned.mgf")
                .arg(
                    Arg::new("mgf")
                        .help(
                            "Path to an MGF file, or to a directory of MGF files. A directory \
                             needs an mgf_filename column in the PEPREC file.",
                        )
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::AnyPath),
                )
                .arg(
                    Arg::new("peprec")
                        .help("Path to the PEPREC file whose spec_id values are scanned for")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("predict-batch", sub_m)) => handle_predict_batch(sub_m),
        Some(("scan-mgf", sub_m)) => handle_scan_mgf(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_predict_batch(matches: &ArgMatches) -> Result<()> {
    let peprec_path: &PathBuf = matches
        .get_one("peprec")
        .ok_or_else(|| anyhow::anyhow!("missing PEPREC path"))?;
    let config_path: Option<&PathBuf> = matches.get_one("config");
    log::info!("[fragint] Predicting peptides from {:?}", peprec_path);

    let params = match PredictionConfig::from_arguments(config_path, matches) {
        Ok(params) => params,
        Err(e) => {
            log::error!("Invalid configuration: {:#}", e);
            std::process::exit(1)
        }
    };

    match run_prediction(&params, peprec_path) {
        Ok(path) => {
            log::info!("[fragint] Predictions written to {:?}", path);
            Ok(())
        }
        Err(e) => {
            log::error!("Prediction failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_scan_mgf(matches: &ArgMatches) -> Result<()> {
    let mgf_path: &PathBuf = matches
        .get_one("mgf")
        .ok_or_else(|| anyhow::anyhow!("missing MGF path"))?;
    let peprec_path: &PathBuf = matches
        .get_one("peprec")
        .ok_or_else(|| anyhow::anyhow!("missing PEPREC path"))?;

    match scan_mgf_for_peprec(mgf_path, peprec_path) {
        Ok(summary) => {
            log::info!(
                "[fragint] {}/{} spectra written to {:?}",
                summary.found,
                summary.requested,
                summary.output
            );
            Ok(())
        }
        Err(e) => {
            log::error!("MGF scan failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
