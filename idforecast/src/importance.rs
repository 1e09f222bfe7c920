//! Feature importance diagnostics collected from every (bag, quantile) fit
//!
//! One table is written per run and records carry no location. When
//! locations are fitted separately, the records of each location follow
//! each other in location order, each block ordered by bag then quantile
//! level, so `(bag_index, quantile_level)` repeats once per location.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Importance of one feature in the model fitted for one bag and quantile level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Feature name
    pub feat: String,
    /// Number of splits made on the feature
    pub importance: f64,
    /// Bag the model was fitted on
    pub bag_index: usize,
    /// Quantile level the model was fitted for
    pub quantile_level: f64,
}

/// Write importance records as a CSV table
pub fn write_feature_importance<P: AsRef<Path>>(
    path: P,
    records: &[FeatureImportance],
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!(path = %path.display(), records = records.len(), "wrote feature importance");
    Ok(())
}

/// Read importance records written by [`write_feature_importance`]
pub fn read_feature_importance<P: AsRef<Path>>(path: P) -> Result<Vec<FeatureImportance>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}
