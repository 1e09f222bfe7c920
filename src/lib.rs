//! # idforecast workspace
//!
//! Umbrella crate re-exporting the workspace members:
//!
//! - [`forecast_math`]: order statistics and the gradient-boosted quantile tree learner
//! - [`idforecast`]: the GBQR forecasting pipeline and hub output
//!
//! ```
//! use idforecast_workspace::forecast_math::stats::median;
//!
//! assert_eq!(median(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), 3.0);
//! ```

pub use forecast_math;
pub use idforecast;
