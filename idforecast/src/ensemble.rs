//! Bagged ensemble of per-quantile models
//!
//! Every bag is a season-blocked resample of the training rows. One model is
//! fitted per (bag, quantile level), each with its own pre-drawn seed, and
//! the per-bag test predictions are combined with the median.
//!
//! All randomness flows from a master seed derived from the reference date,
//! so re-running a forecast date reproduces the same output. The seed matrix
//! and the bag memberships are drawn up front, which makes the individual
//! fits independent of execution order; they run on the rayon pool.

use crate::data::FeatureFrame;
use crate::error::{ForecastError, Result};
use crate::importance::FeatureImportance;
use crate::models::{QuantileFit, QuantileTrainer};
use chrono::{NaiveDate, NaiveTime};
use forecast_math::stats::median;
use forecast_math::FeatureMatrix;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Exclusive upper bound of per-fit seeds
pub const MAX_FIT_SEED: u64 = 100_000_000;

/// Master seed of a run: seconds since the Unix epoch at midnight UTC of `ref_date`
pub fn derive_master_seed(ref_date: NaiveDate) -> u64 {
    ref_date.and_time(NaiveTime::MIN).and_utc().timestamp() as u64
}

/// Seeds for every (bag, quantile) fit, stored bag-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedMatrix {
    seeds: Vec<u64>,
    n_bags: usize,
    n_quantiles: usize,
}

impl SeedMatrix {
    /// Draw `n_bags * n_quantiles` seeds from `rng`
    pub fn draw(rng: &mut StdRng, n_bags: usize, n_quantiles: usize) -> Self {
        let seeds = (0..n_bags * n_quantiles)
            .map(|_| rng.gen_range(0..MAX_FIT_SEED))
            .collect();
        Self {
            seeds,
            n_bags,
            n_quantiles,
        }
    }

    /// Seed for bag `bag` and quantile index `q`
    pub fn get(&self, bag: usize, q: usize) -> u64 {
        self.seeds[bag * self.n_quantiles + q]
    }

    pub fn n_bags(&self) -> usize {
        self.n_bags
    }

    pub fn n_quantiles(&self) -> usize {
        self.n_quantiles
    }
}

/// Sample `floor(len * fraction)` distinct seasons without replacement
pub fn sample_bag_seasons(
    rng: &mut StdRng,
    seasons: &[String],
    fraction: f64,
) -> Result<Vec<String>> {
    let amount = (seasons.len() as f64 * fraction).floor() as usize;
    if amount == 0 {
        return Err(ForecastError::DataError(format!(
            "bag of {} of {} training seasons contains no season",
            fraction,
            seasons.len()
        )));
    }

    Ok(index::sample(rng, seasons.len(), amount)
        .into_iter()
        .map(|i| seasons[i].clone())
        .collect())
}

/// Wide table of consensus predictions: one row per test observation, one
/// column per quantile level, values in transformed-delta space
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTable {
    q_labels: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl PredictionTable {
    /// Create a table from rows of per-quantile values
    pub fn new(q_labels: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if let Some(row) = values.iter().find(|r| r.len() != q_labels.len()) {
            return Err(ForecastError::DataError(format!(
                "prediction row has {} values for {} quantile levels",
                row.len(),
                q_labels.len()
            )));
        }
        Ok(Self { q_labels, values })
    }

    pub fn q_labels(&self) -> &[String] {
        &self.q_labels
    }

    pub fn n_rows(&self) -> usize {
        self.values.len()
    }

    /// Prediction for test row `row` at quantile index `q`
    pub fn get(&self, row: usize, q: usize) -> f64 {
        self.values[row][q]
    }

    /// All predictions for one test row
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row]
    }
}

/// Aggregate per-bag predictions for one test row and quantile level
pub fn aggregate_bags(per_bag: &[f64]) -> Result<f64> {
    Ok(median(per_bag)?)
}

/// Output of the bagged ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutput {
    /// Consensus predictions
    pub predictions: PredictionTable,
    /// Importance records ordered by bag, then quantile level
    pub feature_importance: Vec<FeatureImportance>,
}

/// Season-blocked bagging around a [`QuantileTrainer`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaggedEnsemble {
    num_bags: usize,
    bag_frac_samples: f64,
}

impl BaggedEnsemble {
    /// Create an ensemble of `num_bags` bags, each holding `bag_frac_samples` of the seasons
    pub fn new(num_bags: usize, bag_frac_samples: f64) -> Result<Self> {
        if num_bags == 0 {
            return Err(ForecastError::ConfigError(
                "num_bags must be at least 1".to_string(),
            ));
        }
        if !(bag_frac_samples > 0.0 && bag_frac_samples <= 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "bag_frac_samples must be within (0, 1], got {}",
                bag_frac_samples
            )));
        }
        Ok(Self {
            num_bags,
            bag_frac_samples,
        })
    }

    pub fn num_bags(&self) -> usize {
        self.num_bags
    }

    /// Fit all bags and quantile levels and return median-aggregated test predictions
    pub fn predict<T: QuantileTrainer>(
        &self,
        trainer: &T,
        train: &FeatureFrame,
        test: &FeatureFrame,
        q_levels: &[f64],
        q_labels: &[String],
        ref_date: NaiveDate,
    ) -> Result<EnsembleOutput> {
        if train.feature_names() != test.feature_names() {
            return Err(ForecastError::DataError(format!(
                "train features {:?} do not match test features {:?}",
                train.feature_names(),
                test.feature_names()
            )));
        }
        if train.is_empty() {
            return Err(ForecastError::DataError(
                "training set is empty".to_string(),
            ));
        }
        if q_levels.len() != q_labels.len() {
            return Err(ForecastError::ConfigError(format!(
                "{} quantile levels but {} labels",
                q_levels.len(),
                q_labels.len()
            )));
        }

        let n_quantiles = q_levels.len();
        let mut rng = StdRng::seed_from_u64(derive_master_seed(ref_date));
        let seeds = SeedMatrix::draw(&mut rng, self.num_bags, n_quantiles);

        let x_train = train.feature_matrix()?;
        let y_train = train.targets()?;
        let x_test = test.feature_matrix()?;
        let seasons = train.seasons();

        // bag membership is drawn sequentially so it does not depend on fit order
        let mut bags: Vec<(FeatureMatrix, Vec<f64>)> = Vec::with_capacity(self.num_bags);
        for b in 0..self.num_bags {
            let bag_seasons: HashSet<String> =
                sample_bag_seasons(&mut rng, &seasons, self.bag_frac_samples)?
                    .into_iter()
                    .collect();
            let rows: Vec<usize> = train
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, r)| bag_seasons.contains(&r.season))
                .map(|(i, _)| i)
                .collect();
            debug!(
                bag = b,
                seasons = bag_seasons.len(),
                rows = rows.len(),
                "sampled bag"
            );

            let y_bag = rows.iter().map(|&i| y_train[i]).collect();
            bags.push((x_train.select_rows(&rows), y_bag));
        }

        let tasks: Vec<(usize, usize)> = (0..self.num_bags)
            .flat_map(|b| (0..n_quantiles).map(move |q| (b, q)))
            .collect();

        let fits: Vec<QuantileFit> = tasks
            .par_iter()
            .map(|&(b, q)| {
                let (x_bag, y_bag) = &bags[b];
                let fit =
                    trainer.fit_predict(x_bag, y_bag, &x_test, q_levels[q], seeds.get(b, q))?;
                if fit.predictions.len() != x_test.n_rows() {
                    return Err(ForecastError::ModelFitError(format!(
                        "bag {} quantile {} returned {} predictions for {} test rows",
                        b,
                        q_levels[q],
                        fit.predictions.len(),
                        x_test.n_rows()
                    )));
                }
                if fit.importance.len() != x_test.n_cols() {
                    return Err(ForecastError::ModelFitError(format!(
                        "bag {} quantile {} returned {} importance scores for {} features",
                        b,
                        q_levels[q],
                        fit.importance.len(),
                        x_test.n_cols()
                    )));
                }
                Ok(fit)
            })
            .collect::<Result<Vec<QuantileFit>>>()?;

        let mut values = Vec::with_capacity(x_test.n_rows());
        let mut per_bag = vec![0.0; self.num_bags];
        for row in 0..x_test.n_rows() {
            let mut row_values = Vec::with_capacity(n_quantiles);
            for q in 0..n_quantiles {
                for (b, slot) in per_bag.iter_mut().enumerate() {
                    *slot = fits[b * n_quantiles + q].predictions[row];
                }
                row_values.push(aggregate_bags(&per_bag)?);
            }
            values.push(row_values);
        }

        let mut feature_importance = Vec::with_capacity(fits.len() * train.feature_names().len());
        for (&(b, q), fit) in tasks.iter().zip(&fits) {
            for (feat, &importance) in train.feature_names().iter().zip(&fit.importance) {
                feature_importance.push(FeatureImportance {
                    feat: feat.clone(),
                    importance,
                    bag_index: b,
                    quantile_level: q_levels[q],
                });
            }
        }

        Ok(EnsembleOutput {
            predictions: PredictionTable::new(q_labels.to_vec(), values)?,
            feature_importance,
        })
    }
}
