//! Gradient-boosted regression trees trained on the pinball loss
//!
//! The booster follows the usual quantile-objective recipe:
//! - initial score is the `alpha` quantile of the targets
//! - each round fits a leaf-wise tree to the pinball-loss gradients
//! - every leaf output is renewed to the `alpha` quantile of the residuals in
//!   that leaf, shrunk by the learning rate
//!
//! All randomness (row and feature subsampling) comes from a single `StdRng`
//! seeded by the caller, so a fit is fully determined by its inputs and seed.

use crate::matrix::FeatureMatrix;
use crate::stats::quantile;
use crate::tree::{RegressionTree, TreeParams};
use crate::{MathError, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Hyperparameters of the quantile booster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every leaf output
    pub learning_rate: f64,
    /// Maximum number of leaves per tree
    pub max_leaves: usize,
    /// Minimum number of rows per leaf
    pub min_data_in_leaf: usize,
    /// Minimum gain required to split a leaf
    pub min_gain_to_split: f64,
    /// Fraction of features considered by each tree
    pub feature_fraction: f64,
    /// Fraction of rows used to grow each tree
    pub bagging_fraction: f64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_leaves: 31,
            min_data_in_leaf: 20,
            min_gain_to_split: 0.0,
            feature_fraction: 1.0,
            bagging_fraction: 1.0,
        }
    }
}

impl BoosterParams {
    /// Check that every parameter is in range
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(MathError::InvalidInput(
                "learning_rate must be positive".to_string(),
            ));
        }
        if self.max_leaves < 2 {
            return Err(MathError::InvalidInput(
                "max_leaves must be at least 2".to_string(),
            ));
        }
        for (name, frac) in [
            ("feature_fraction", self.feature_fraction),
            ("bagging_fraction", self.bagging_fraction),
        ] {
            if !(frac > 0.0 && frac <= 1.0) {
                return Err(MathError::InvalidInput(format!(
                    "{} must be within (0, 1], got {}",
                    name, frac
                )));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_leaves: self.max_leaves,
            min_data_in_leaf: self.min_data_in_leaf,
            min_gain_to_split: self.min_gain_to_split,
        }
    }
}

/// Fitted quantile booster
#[derive(Debug, Clone)]
pub struct QuantileBooster {
    alpha: f64,
    init_score: f64,
    trees: Vec<RegressionTree>,
    split_counts: Vec<u32>,
}

impl QuantileBooster {
    /// Fit a booster for quantile level `alpha`
    pub fn fit(
        x: &FeatureMatrix,
        y: &[f64],
        alpha: f64,
        seed: u64,
        params: &BoosterParams,
    ) -> Result<Self> {
        params.validate()?;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(MathError::InvalidInput(format!(
                "Quantile level must be within (0, 1), got {}",
                alpha
            )));
        }
        if x.n_rows() != y.len() {
            return Err(MathError::InvalidInput(format!(
                "Feature matrix has {} rows but target has {} values",
                x.n_rows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot fit a booster without training rows".to_string(),
            ));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(MathError::CalculationError(
                "Training target contains non-finite values".to_string(),
            ));
        }

        let n_rows = x.n_rows();
        let n_cols = x.n_cols();
        let tree_params = params.tree_params();
        let mut rng = StdRng::seed_from_u64(seed);

        let init_score = quantile(y, alpha)?;
        let mut scores = vec![init_score; n_rows];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut split_counts = vec![0u32; n_cols];

        for _ in 0..params.n_estimators {
            let gradients: Vec<f64> = y
                .iter()
                .zip(scores.iter())
                .map(|(&target, &score)| if target > score { alpha } else { alpha - 1.0 })
                .collect();

            let rows = subsample(&mut rng, n_rows, params.bagging_fraction);
            let features = subsample(&mut rng, n_cols, params.feature_fraction);

            let (mut tree, leaves) =
                RegressionTree::grow(x, &gradients, &rows, &features, &tree_params)?;
            if tree.n_leaves() <= 1 {
                break;
            }

            for leaf in &leaves {
                let residuals: Vec<f64> = leaf.rows.iter().map(|&r| y[r] - scores[r]).collect();
                let output = params.learning_rate * quantile(&residuals, alpha)?;
                tree.set_leaf_value(leaf.node, output)?;
            }

            for (i, score) in scores.iter_mut().enumerate() {
                *score += tree.predict_row(x.row(i));
            }
            if scores.iter().any(|s| !s.is_finite()) {
                return Err(MathError::CalculationError(
                    "Boosting produced non-finite scores".to_string(),
                ));
            }

            tree.accumulate_split_counts(&mut split_counts);
            trees.push(tree);
        }

        Ok(Self {
            alpha,
            init_score,
            trees,
            split_counts,
        })
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != self.split_counts.len() {
            return Err(MathError::InvalidInput(format!(
                "Model was fitted on {} features, got {}",
                self.split_counts.len(),
                x.n_cols()
            )));
        }

        Ok((0..x.n_rows())
            .map(|i| {
                let row = x.row(i);
                self.init_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect())
    }

    /// Number of splits made on each feature across all trees
    pub fn feature_importances(&self) -> &[u32] {
        &self.split_counts
    }

    /// Quantile level the booster was fitted for
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of trees kept after training
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn subsample(rng: &mut StdRng, n: usize, fraction: f64) -> Vec<usize> {
    if fraction >= 1.0 || n == 0 {
        return (0..n).collect();
    }
    let amount = ((n as f64 * fraction).round() as usize).clamp(1, n);
    let mut picked = index::sample(rng, n, amount).into_vec();
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::pinball_loss;
    use approx::assert_relative_eq;

    fn linear_data(n: usize) -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, ((i * 7) % 5) as f64]).collect();
        // noise pattern repeats every 10 rows
        let y = (0..n)
            .map(|i| 0.5 * i as f64 + ((i % 10) as f64 - 4.5))
            .collect();
        (FeatureMatrix::from_rows(&rows).unwrap(), y)
    }

    #[test]
    fn fit_is_reproducible_for_a_seed() {
        let (x, y) = linear_data(200);
        let params = BoosterParams {
            feature_fraction: 0.5,
            bagging_fraction: 0.8,
            ..BoosterParams::default()
        };
        let a = QuantileBooster::fit(&x, &y, 0.5, 42, &params).unwrap();
        let b = QuantileBooster::fit(&x, &y, 0.5, 42, &params).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn boosting_beats_constant_quantile() {
        let (x, y) = linear_data(200);
        let params = BoosterParams::default();
        for alpha in [0.1, 0.5, 0.9] {
            let model = QuantileBooster::fit(&x, &y, alpha, 7, &params).unwrap();
            assert_eq!(model.alpha(), alpha);
            let fitted = model.predict(&x).unwrap();
            let constant = vec![quantile(&y, alpha).unwrap(); y.len()];
            let boosted_loss = pinball_loss(&y, &fitted, alpha).unwrap();
            let constant_loss = pinball_loss(&y, &constant, alpha).unwrap();
            assert!(boosted_loss < constant_loss);
            assert!(model.n_trees() > 0);
            assert!(model.feature_importances()[0] > 0);
        }
    }

    #[test]
    fn upper_quantile_sits_above_lower_quantile_on_average() {
        let (x, y) = linear_data(200);
        let params = BoosterParams::default();
        let low = QuantileBooster::fit(&x, &y, 0.1, 1, &params).unwrap();
        let high = QuantileBooster::fit(&x, &y, 0.9, 1, &params).unwrap();
        let low_mean: f64 = low.predict(&x).unwrap().iter().sum::<f64>() / 200.0;
        let high_mean: f64 = high.predict(&x).unwrap().iter().sum::<f64>() / 200.0;
        assert!(high_mean > low_mean);
    }

    #[test]
    fn tiny_training_set_falls_back_to_initial_quantile() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let y = [1.0, 2.0, 3.0];
        let model = QuantileBooster::fit(&x, &y, 0.5, 0, &BoosterParams::default()).unwrap();
        assert_eq!(model.n_trees(), 0);
        for p in model.predict(&x).unwrap() {
            assert_relative_eq!(p, 2.0);
        }
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let x = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
        let params = BoosterParams::default();
        assert!(QuantileBooster::fit(&x, &[1.0], 0.5, 0, &params).is_err());
        assert!(QuantileBooster::fit(&x, &[1.0, 2.0], 1.0, 0, &params).is_err());
        assert!(QuantileBooster::fit(&x, &[1.0, f64::NAN], 0.5, 0, &params).is_err());

        let model = QuantileBooster::fit(&x, &[1.0, 2.0], 0.5, 0, &params).unwrap();
        let wide = FeatureMatrix::from_rows(&[vec![1.0, 2.0]]).unwrap();
        assert!(model.predict(&wide).is_err());
    }
}
