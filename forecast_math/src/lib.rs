//! # Forecast Math
//!
//! Numerical building blocks for quantile forecasting.
//! This crate provides order statistics, a dense feature matrix and a
//! gradient-boosted regression tree learner trained on the pinball loss.

use thiserror::Error;

pub mod booster;
pub mod matrix;
pub mod stats;
pub mod tree;

pub use crate::booster::{BoosterParams, QuantileBooster};
pub use crate::matrix::FeatureMatrix;

/// Errors that can occur in numerical routines
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;
