//! `gbqr_forecast` binary: fit the GBQR model for one reference date and
//! write the hub submission table.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin gbqr_forecast -- \
//!     --model-config gbqr.json --run-config run.json --features features.csv
//! ```

use chrono::NaiveDate;
use clap::Parser;
use idforecast::data::DataLoader;
use idforecast::models::{ForecastModel, GbqrModel};
use idforecast::{ModelConfig, RunConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Command-line arguments for the forecasting binary.
#[derive(Parser, Debug)]
#[command(
    name = "gbqr_forecast",
    version,
    about = "Bagged gradient-boosted quantile regression forecasts in hub format",
    long_about = None
)]
struct Args {
    /// Path to the JSON model configuration.
    #[arg(long, value_name = "FILE")]
    model_config: PathBuf,

    /// Path to the JSON run configuration.
    #[arg(long, value_name = "FILE")]
    run_config: PathBuf,

    /// CSV table of engineered features and targets.
    #[arg(long, value_name = "FILE")]
    features: PathBuf,

    /// Override the reference date (YYYY-MM-DD, must be a Saturday).
    #[arg(long, value_name = "DATE")]
    ref_date: Option<NaiveDate>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn run(args: Args) -> idforecast::Result<()> {
    let model_config = ModelConfig::from_json_file(&args.model_config)?;
    let mut run_config = RunConfig::from_json_file(&args.run_config)?;
    if let Some(date) = args.ref_date {
        run_config = run_config.with_ref_date(date)?;
    }

    info!(
        model = model_config.model_name(),
        ref_date = %run_config.ref_date(),
        disease = %run_config.disease(),
        "loading features from {}",
        args.features.display()
    );
    let frame = DataLoader::from_csv(&args.features, model_config.feature_names())?;

    let model = GbqrModel::new(model_config)?;
    let artifacts = model.run(&run_config, &frame)?;

    info!("forecasts written to {}", artifacts.forecast_path.display());
    if let Some(path) = artifacts.importance_path {
        info!("feature importance written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level_filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .init();

    info!("{} v{}", idforecast::NAME, idforecast::VERSION);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("forecast run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
