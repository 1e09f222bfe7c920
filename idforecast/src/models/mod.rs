//! Forecasting models and the seams between their stages

use crate::config::RunConfig;
use crate::data::FeatureFrame;
use crate::error::Result;
use crate::hub::HubRow;
use crate::importance::FeatureImportance;
use forecast_math::FeatureMatrix;
use std::path::PathBuf;

/// Output of one quantile fit
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileFit {
    /// One prediction per test row
    pub predictions: Vec<f64>,
    /// One importance score per feature column
    pub importance: Vec<f64>,
}

/// Fits a single pinball-loss regression model and predicts held-out rows.
///
/// Implementations must be deterministic: identical inputs and seed give
/// identical predictions. Fits for different (bag, quantile) pairs may run
/// concurrently.
pub trait QuantileTrainer: Sync {
    /// Fit on (`x_train`, `y_train`) at `q_level` and predict every row of `x_test`
    fn fit_predict(
        &self,
        x_train: &FeatureMatrix,
        y_train: &[f64],
        x_test: &FeatureMatrix,
        q_level: f64,
        seed: u64,
    ) -> Result<QuantileFit>;
}

/// In-memory result of a forecast run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastOutput {
    /// Hub-format quantile rows
    pub hub_rows: Vec<HubRow>,
    /// Importance of every feature in every (bag, quantile) fit
    pub feature_importance: Vec<FeatureImportance>,
}

/// Files written by a forecast run
#[derive(Debug, Clone, PartialEq)]
pub struct RunArtifacts {
    /// Hub submission table
    pub forecast_path: PathBuf,
    /// Feature importance table, when requested
    pub importance_path: Option<PathBuf>,
}

/// Common run contract shared by every model family
pub trait ForecastModel {
    /// Model name used in output paths
    fn model_name(&self) -> &str;

    /// Produce hub-format forecasts without touching the file system
    fn forecast(&self, run_config: &RunConfig, frame: &FeatureFrame) -> Result<ForecastOutput>;

    /// Produce forecasts and persist them under the run's output roots
    fn run(&self, run_config: &RunConfig, frame: &FeatureFrame) -> Result<RunArtifacts>;
}

pub mod gbqr;
pub mod quantile_gbm;

pub use gbqr::GbqrModel;
pub use quantile_gbm::GradientBoostedTrainer;
