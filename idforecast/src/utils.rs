//! Utility functions for the idforecast crate

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the reference date of a weekly forecast.
///
/// Without an explicit date, forecasts are relative to the next Saturday
/// strictly after `today`. An explicit date must itself be a Saturday.
pub fn validate_ref_date(ref_date: Option<NaiveDate>, today: NaiveDate) -> Result<NaiveDate> {
    match ref_date {
        None => Ok(next_saturday(today)),
        Some(date) if date.weekday() == Weekday::Sat => Ok(date),
        Some(date) => Err(ForecastError::ConfigError(format!(
            "ref_date must be a Saturday, got {} ({})",
            date,
            date.weekday()
        ))),
    }
}

/// First Saturday strictly after `date`
pub fn next_saturday(date: NaiveDate) -> NaiveDate {
    let from_monday = i64::from(date.weekday().num_days_from_monday());
    let days_ahead = 7 - (from_monday + 2) % 7;
    date + Duration::days(days_ahead)
}

/// Directory holding all files of one model, `<root>/<provider>-<model_name>[/<subdir>]`.
///
/// The directory is created if it does not exist.
pub fn build_save_dir(
    root: &Path,
    provider: &str,
    model_name: &str,
    subdir: Option<&str>,
) -> Result<PathBuf> {
    let mut save_dir = root.join(format!("{}-{}", provider, model_name));
    if let Some(subdir) = subdir {
        save_dir = save_dir.join(subdir);
    }
    fs::create_dir_all(&save_dir)?;
    Ok(save_dir)
}

/// Path of the table for one reference date, `<dir>/<ref_date>-<provider>-<model_name>.csv`
pub fn build_save_path(
    root: &Path,
    provider: &str,
    model_name: &str,
    ref_date: NaiveDate,
    subdir: Option<&str>,
) -> Result<PathBuf> {
    let save_dir = build_save_dir(root, provider, model_name, subdir)?;
    Ok(save_dir.join(format!(
        "{}-{}-{}.csv",
        ref_date.format("%Y-%m-%d"),
        provider,
        model_name
    )))
}
