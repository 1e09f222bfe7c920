//! Gradient-boosted tree implementation of the quantile trainer

use crate::error::Result;
use crate::models::{QuantileFit, QuantileTrainer};
use forecast_math::{BoosterParams, FeatureMatrix, QuantileBooster};

/// Quantile trainer backed by [`QuantileBooster`]
#[derive(Debug, Clone, Default)]
pub struct GradientBoostedTrainer {
    params: BoosterParams,
}

impl GradientBoostedTrainer {
    /// Create a trainer with the given booster hyperparameters
    pub fn new(params: BoosterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }
}

impl QuantileTrainer for GradientBoostedTrainer {
    fn fit_predict(
        &self,
        x_train: &FeatureMatrix,
        y_train: &[f64],
        x_test: &FeatureMatrix,
        q_level: f64,
        seed: u64,
    ) -> Result<QuantileFit> {
        let model = QuantileBooster::fit(x_train, y_train, q_level, seed, &self.params)?;
        let predictions = model.predict(x_test)?;
        let importance = model
            .feature_importances()
            .iter()
            .map(|&c| f64::from(c))
            .collect();

        Ok(QuantileFit {
            predictions,
            importance,
        })
    }
}
