//! # idforecast
//!
//! Probabilistic forecasts of weekly disease-surveillance counts, produced by
//! a bagged ensemble of gradient-boosted quantile regression models (GBQR)
//! and published in the hub submission format.
//!
//! ## Pipeline
//!
//! - **Bagged ensemble**: one pinball-loss model per (bag, quantile level),
//!   each bag a season-blocked resample of the training rows, combined with
//!   the median across bags
//! - **Scale inversion**: predicted deltas of the transformed signal are
//!   mapped back to non-negative counts
//! - **Hub formatting**: wide per-quantile predictions become one row per
//!   quantile with target dates and horizons relative to the reference date
//! - **Noncrossing correction**: values are sorted within each forecast so
//!   higher quantile levels never get lower values
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idforecast::config::{Disease, ModelConfig, RunConfig};
//! use idforecast::data::DataLoader;
//! use idforecast::models::{ForecastModel, GbqrModel};
//! use chrono::NaiveDate;
//!
//! # fn main() -> idforecast::Result<()> {
//! let features = vec!["inc_trans_cs".to_string(), "season_week".to_string()];
//! let model_config = ModelConfig::new("gbqr", 10, 0.7, features.clone())?;
//! let run_config = RunConfig::new(
//!     NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
//!     Disease::Flu,
//!     3,
//!     vec![0.025, 0.5, 0.975],
//!     vec!["0.025".into(), "0.5".into(), "0.975".into()],
//!     "model-output",
//! )?;
//!
//! let frame = DataLoader::from_csv("features.csv", &features)?;
//! let model = GbqrModel::new(model_config)?;
//! let artifacts = model.run(&run_config, &frame)?;
//! println!("wrote {}", artifacts.forecast_path.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod ensemble;
pub mod error;
pub mod hub;
pub mod importance;
pub mod models;
pub mod noncrossing;
pub mod transform;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{Disease, ModelConfig, PowerTransform, RunConfig};
pub use crate::data::{DataLoader, FeatureFrame, ObservationRow};
pub use crate::error::{ForecastError, Result};
pub use crate::hub::HubRow;
pub use crate::models::{ForecastModel, GbqrModel, QuantileTrainer};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
