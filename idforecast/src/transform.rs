//! Inversion of the upstream signal transforms
//!
//! Upstream, counts are converted to a rate per 100k population, offset by
//! a floor, power transformed, then centered and scaled per series. The
//! inverter undoes these steps in reverse order for a predicted delta.

use crate::config::{PowerTransform, TransformConstants};
use crate::data::ObservationRow;
use crate::error::{ForecastError, Result};

/// Population unit the rates are expressed in
pub const RATE_UNIT: f64 = 100_000.0;

/// Per-row quantities needed to put a predicted delta back on the count scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesScale {
    /// Transformed, centered and scaled signal at the forecast origin
    pub inc_trans_cs: f64,
    /// Per-series centering factor
    pub center_factor: f64,
    /// Per-series scale factor
    pub scale_factor: f64,
    /// Population of the location
    pub pop: f64,
}

impl From<&ObservationRow> for SeriesScale {
    fn from(row: &ObservationRow) -> Self {
        Self {
            inc_trans_cs: row.inc_trans_cs,
            center_factor: row.inc_trans_center_factor,
            scale_factor: row.inc_trans_scale_factor,
            pop: row.pop,
        }
    }
}

/// Maps predicted transformed deltas to non-negative counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleInverter {
    constants: TransformConstants,
}

impl ScaleInverter {
    /// Inverter for one of the supported transforms
    pub fn new(transform: PowerTransform) -> Self {
        Self {
            constants: transform.constants(),
        }
    }

    /// Inverter for a custom transform convention
    pub fn from_constants(constants: TransformConstants) -> Result<Self> {
        if constants.inv_power < 1 {
            return Err(ForecastError::ConfigError(format!(
                "inverse power must be at least 1, got {}",
                constants.inv_power
            )));
        }
        if !constants.scale_stabilizer.is_finite() || !constants.floor_offset.is_finite() {
            return Err(ForecastError::ConfigError(
                "transform constants must be finite".to_string(),
            ));
        }
        Ok(Self { constants })
    }

    pub fn constants(&self) -> &TransformConstants {
        &self.constants
    }

    /// Forecast count for a predicted delta
    pub fn invert(&self, scale: SeriesScale, delta_hat: f64) -> f64 {
        let c = &self.constants;
        let cs_target = scale.inc_trans_cs + delta_hat;
        let trans_target =
            (cs_target + scale.center_factor) * (scale.scale_factor + c.scale_stabilizer);
        let rate = trans_target.max(0.0).powi(c.inv_power) - c.floor_offset;
        (rate * scale.pop / RATE_UNIT).max(0.0)
    }

    /// Forecast count for a predicted delta on an observation row
    pub fn invert_row(&self, row: &ObservationRow, delta_hat: f64) -> f64 {
        self.invert(SeriesScale::from(row), delta_hat)
    }
}
