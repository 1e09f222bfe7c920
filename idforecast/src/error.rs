//! Error types for the idforecast crate

use forecast_math::MathError;
use thiserror::Error;

/// Custom error types for the idforecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Invalid or unsupported configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error raised while fitting or applying a quantile model
    #[error("Model fit error: {0}")]
    ModelFitError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from reading or writing delimited tables
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from reading configuration files
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from parsing dates
    #[error("Date parse error: {0}")]
    DateParseError(#[from] chrono::ParseError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        ForecastError::ModelFitError(err.to_string())
    }
}
