//! Order statistics and loss functions used by the quantile learners
//!
//! Contains:
//! - Median of a sample
//! - Sample quantiles
//! - Pinball (quantile) loss

use crate::{MathError, Result};
use statrs::statistics::{Data, Median, OrderStatistics};

/// Median of a non-empty sample of finite values.
///
/// For an even number of values this is the mean of the two middle values.
pub fn median(values: &[f64]) -> Result<f64> {
    check_sample(values)?;
    Ok(Data::new(values.to_vec()).median())
}

/// Sample quantile at level `tau` in `[0, 1]`.
pub fn quantile(values: &[f64], tau: f64) -> Result<f64> {
    check_sample(values)?;
    if !(0.0..=1.0).contains(&tau) {
        return Err(MathError::InvalidInput(format!(
            "Quantile level must be within [0, 1], got {}",
            tau
        )));
    }

    let mut data = Data::new(values.to_vec());
    Ok(data.quantile(tau))
}

/// Mean pinball loss of `predictions` against `actual` at level `alpha`.
pub fn pinball_loss(actual: &[f64], predictions: &[f64], alpha: f64) -> Result<f64> {
    if actual.len() != predictions.len() || actual.is_empty() {
        return Err(MathError::InvalidInput(
            "Actual and predicted values must have the same non-zero length".to_string(),
        ));
    }

    let total: f64 = actual
        .iter()
        .zip(predictions.iter())
        .map(|(&y, &p)| {
            let residual = y - p;
            if residual >= 0.0 {
                alpha * residual
            } else {
                (alpha - 1.0) * residual
            }
        })
        .sum();

    Ok(total / actual.len() as f64)
}

fn check_sample(values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute an order statistic of an empty sample".to_string(),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Sample contains non-finite values".to_string(),
        ));
    }
    Ok(())
}
