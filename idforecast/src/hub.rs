//! Hub submission format
//!
//! The hub table is long: one row per (location, horizon, quantile level),
//! with dates and horizons expressed relative to the run's reference date.

use crate::config::Disease;
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// `output_type` of every row this crate produces
pub const OUTPUT_TYPE_QUANTILE: &str = "quantile";

/// One row of the published table, in column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubRow {
    pub location: String,
    pub reference_date: NaiveDate,
    pub horizon: i64,
    pub target_end_date: NaiveDate,
    pub target: String,
    pub output_type: String,
    pub output_type_id: String,
    pub value: f64,
}

/// A count-scale quantile prediction for one test observation, before formatting
#[derive(Debug, Clone, PartialEq)]
pub struct QuantilePrediction {
    pub location: String,
    /// Week-ending date of the test observation
    pub wk_end_date: NaiveDate,
    /// Horizon of the test observation
    pub horizon: u32,
    /// Quantile label
    pub quantile: String,
    pub value: f64,
}

/// Reshape predictions into hub rows.
///
/// The reported horizon is recomputed from the target end date and must be
/// a whole number of weeks after (or before) `ref_date`.
pub fn format_hub_rows(
    predictions: &[QuantilePrediction],
    ref_date: NaiveDate,
    disease: Disease,
) -> Result<Vec<HubRow>> {
    let target = disease.target_label();

    predictions
        .iter()
        .map(|p| {
            let target_end_date = p.wk_end_date + Duration::days(7 * i64::from(p.horizon));
            let days = (target_end_date - ref_date).num_days();
            if days % 7 != 0 {
                return Err(ForecastError::DataError(format!(
                    "target end date {} for location {} is not a whole number of weeks from {}",
                    target_end_date, p.location, ref_date
                )));
            }

            Ok(HubRow {
                location: p.location.clone(),
                reference_date: ref_date,
                horizon: days / 7,
                target_end_date,
                target: target.clone(),
                output_type: OUTPUT_TYPE_QUANTILE.to_string(),
                output_type_id: p.quantile.clone(),
                value: p.value,
            })
        })
        .collect()
}

/// Write hub rows as a CSV table
pub fn write_hub_csv<P: AsRef<Path>>(path: P, rows: &[HubRow]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "wrote hub forecasts");
    Ok(())
}

/// Read a hub CSV table
pub fn read_hub_csv<P: AsRef<Path>>(path: P) -> Result<Vec<HubRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
