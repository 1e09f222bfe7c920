//! Gradient-boosted quantile regression (GBQR) model
//!
//! A run filters the feature table, splits it into training rows (observed
//! target delta) and test rows (latest week), fits the bagged ensemble and
//! turns its consensus predictions into a noncrossing hub table.

use crate::config::{ModelConfig, RunConfig};
use crate::data::FeatureFrame;
use crate::ensemble::BaggedEnsemble;
use crate::error::{ForecastError, Result};
use crate::hub::{format_hub_rows, write_hub_csv, QuantilePrediction};
use crate::importance::write_feature_importance;
use crate::models::{
    ForecastModel, ForecastOutput, GradientBoostedTrainer, QuantileTrainer, RunArtifacts,
};
use crate::noncrossing::sort_noncrossing;
use crate::transform::ScaleInverter;
use crate::utils::build_save_path;
use tracing::info;

/// Subdirectory of the artifact store holding importance tables
pub const FEAT_IMPORTANCE_SUBDIR: &str = "feat_importance";

/// GBQR model: bagged pinball-loss regressors, median-combined
#[derive(Debug, Clone)]
pub struct GbqrModel<T = GradientBoostedTrainer> {
    config: ModelConfig,
    ensemble: BaggedEnsemble,
    trainer: T,
}

impl GbqrModel<GradientBoostedTrainer> {
    /// Create a model using gradient-boosted trees as the quantile trainer
    pub fn new(config: ModelConfig) -> Result<Self> {
        let trainer = GradientBoostedTrainer::new(*config.booster());
        Self::with_trainer(config, trainer)
    }
}

impl<T: QuantileTrainer> GbqrModel<T> {
    /// Create a model with a custom quantile trainer
    pub fn with_trainer(config: ModelConfig, trainer: T) -> Result<Self> {
        let ensemble = BaggedEnsemble::new(config.num_bags(), config.bag_frac_samples())?;
        Ok(Self {
            config,
            ensemble,
            trainer,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Rows the model is fitted and evaluated on, after run-level filtering
    fn prepare(&self, run_config: &RunConfig, frame: &FeatureFrame) -> Result<FeatureFrame> {
        let frame = match run_config.locations() {
            Some(locations) => frame.filter_locations(locations),
            None => frame.clone(),
        };
        frame
            .filter_in_season(run_config.disease())
            .filter_max_horizon(run_config.max_horizon())
            .select_features(&self.config.selected_features())
    }

    /// Fit the ensemble on `train` and format predictions for `test`
    fn train_and_predict(
        &self,
        run_config: &RunConfig,
        train: &FeatureFrame,
        test: &FeatureFrame,
    ) -> Result<ForecastOutput> {
        let ensemble = self.ensemble.predict(
            &self.trainer,
            train,
            test,
            run_config.q_levels(),
            run_config.q_labels(),
            run_config.ref_date(),
        )?;

        let inverter = ScaleInverter::new(self.config.power_transform());
        let table = &ensemble.predictions;
        let published: Vec<usize> = test
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.source == self.config.target_source())
            .map(|(i, _)| i)
            .collect();

        let mut predictions = Vec::with_capacity(published.len() * table.q_labels().len());
        for (q, label) in table.q_labels().iter().enumerate() {
            for &i in &published {
                let row = &test.rows()[i];
                predictions.push(QuantilePrediction {
                    location: row.location.clone(),
                    wk_end_date: row.wk_end_date,
                    horizon: row.horizon,
                    quantile: label.clone(),
                    value: inverter.invert_row(row, table.get(i, q)),
                });
            }
        }

        let hub_rows = format_hub_rows(&predictions, run_config.ref_date(), run_config.disease())?;
        Ok(ForecastOutput {
            hub_rows: sort_noncrossing(hub_rows)?,
            feature_importance: ensemble.feature_importance,
        })
    }
}

impl<T: QuantileTrainer> ForecastModel for GbqrModel<T> {
    fn model_name(&self) -> &str {
        self.config.model_name()
    }

    fn forecast(&self, run_config: &RunConfig, frame: &FeatureFrame) -> Result<ForecastOutput> {
        let frame = self.prepare(run_config, frame)?;
        let (train, test) = frame.split_train_test();
        if test.is_empty() {
            return Err(ForecastError::DataError(
                "no test rows to forecast".to_string(),
            ));
        }

        info!(
            model = self.config.model_name(),
            ref_date = %run_config.ref_date(),
            train_rows = train.len(),
            test_rows = test.len(),
            bags = self.config.num_bags(),
            quantiles = run_config.q_levels().len(),
            "fitting gbqr"
        );

        if !self.config.fit_locations_separately() {
            return self.train_and_predict(run_config, &train, &test);
        }

        let mut output = ForecastOutput::default();
        for location in test.locations() {
            let loc_train = train.for_location(&location);
            if loc_train.is_empty() {
                return Err(ForecastError::DataError(format!(
                    "no training rows for location {}",
                    location
                )));
            }
            info!(location = %location, train_rows = loc_train.len(), "fitting location");

            let loc_output =
                self.train_and_predict(run_config, &loc_train, &test.for_location(&location))?;
            output.hub_rows.extend(loc_output.hub_rows);
            output
                .feature_importance
                .extend(loc_output.feature_importance);
        }
        Ok(output)
    }

    fn run(&self, run_config: &RunConfig, frame: &FeatureFrame) -> Result<RunArtifacts> {
        let output = self.forecast(run_config, frame)?;

        let importance_path = match run_config.artifact_store_root() {
            Some(root) if run_config.save_feat_importance() => {
                let path = build_save_path(
                    root,
                    run_config.provider(),
                    self.config.model_name(),
                    run_config.ref_date(),
                    Some(FEAT_IMPORTANCE_SUBDIR),
                )?;
                write_feature_importance(&path, &output.feature_importance)?;
                Some(path)
            }
            _ => None,
        };

        let forecast_path = build_save_path(
            run_config.output_root(),
            run_config.provider(),
            self.config.model_name(),
            run_config.ref_date(),
            None,
        )?;
        write_hub_csv(&forecast_path, &output.hub_rows)?;

        info!(
            model = self.config.model_name(),
            rows = output.hub_rows.len(),
            path = %forecast_path.display(),
            "gbqr run complete"
        );

        Ok(RunArtifacts {
            forecast_path,
            importance_path,
        })
    }
}
