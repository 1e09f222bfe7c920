//! Typed observation rows supplied by the upstream feature pipeline
//!
//! The upstream table is validated once, when it is loaded: every required
//! column must exist and parse to its semantic type. Everything downstream
//! works on [`ObservationRow`] values instead of string-keyed columns.

use crate::config::Disease;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use forecast_math::FeatureMatrix;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Columns every feature table must provide, besides the feature columns
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "source",
    "location",
    "wk_end_date",
    "pop",
    "season",
    "season_week",
    "horizon",
    "inc_trans_cs",
    "inc_trans_center_factor",
    "inc_trans_scale_factor",
    "delta_target",
];

/// One (source, location, week-ending date, horizon) observation
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRow {
    /// Surveillance source, e.g. `nhsn`
    pub source: String,
    /// Location code
    pub location: String,
    /// Week-ending date of the observation
    pub wk_end_date: NaiveDate,
    /// Population of the location
    pub pop: f64,
    /// Season identifier, e.g. `2022/23`
    pub season: String,
    /// Week within the season
    pub season_week: u32,
    /// Forecast horizon in weeks this row's target refers to
    pub horizon: u32,
    /// Transformed, centered and scaled signal at `wk_end_date`
    pub inc_trans_cs: f64,
    /// Per-series centering factor
    pub inc_trans_center_factor: f64,
    /// Per-series scale factor
    pub inc_trans_scale_factor: f64,
    /// Change of the transformed signal `horizon` weeks ahead, if observed
    pub delta_target: Option<f64>,
    /// Engineered feature values, aligned with the frame's feature names
    pub features: Vec<f64>,
}

/// Collection of observation rows sharing one feature schema
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    feature_names: Vec<String>,
    rows: Vec<ObservationRow>,
}

impl FeatureFrame {
    /// Create a frame, checking that every row matches the feature schema
    pub fn new(feature_names: Vec<String>, rows: Vec<ObservationRow>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.features.len() != feature_names.len()) {
            return Err(ForecastError::DataError(format!(
                "row for location {} on {} has {} features, expected {}",
                row.location,
                row.wk_end_date,
                row.features.len(),
                feature_names.len()
            )));
        }

        Ok(Self {
            feature_names,
            rows,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for which `keep` returns true, same schema
    pub fn filter<F>(&self, keep: F) -> Self
    where
        F: Fn(&ObservationRow) -> bool,
    {
        Self {
            feature_names: self.feature_names.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Rows whose location is in `locations`
    pub fn filter_locations(&self, locations: &[String]) -> Self {
        let wanted: HashSet<&str> = locations.iter().map(String::as_str).collect();
        self.filter(|r| wanted.contains(r.location.as_str()))
    }

    /// Rows for one location
    pub fn for_location(&self, location: &str) -> Self {
        self.filter(|r| r.location == location)
    }

    /// Rows inside the modelled season of `disease`
    pub fn filter_in_season(&self, disease: Disease) -> Self {
        self.filter(|r| disease.in_season(r.season_week))
    }

    /// Rows with a horizon of at most `max_horizon`
    pub fn filter_max_horizon(&self, max_horizon: u32) -> Self {
        self.filter(|r| r.horizon <= max_horizon)
    }

    /// Keep only the named feature columns, in the given order
    pub fn select_features(&self, names: &[String]) -> Result<Self> {
        let positions = names
            .iter()
            .map(|name| {
                self.feature_names
                    .iter()
                    .position(|f| f == name)
                    .ok_or_else(|| {
                        ForecastError::DataError(format!("feature column {:?} not found", name))
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|r| ObservationRow {
                features: positions.iter().map(|&p| r.features[p]).collect(),
                ..r.clone()
            })
            .collect();

        Ok(Self {
            feature_names: names.to_vec(),
            rows,
        })
    }

    /// Split into (train, test).
    ///
    /// Test rows are all rows at the latest week-ending date; training rows
    /// are all rows with an observed target delta.
    pub fn split_train_test(&self) -> (Self, Self) {
        let last_date = self.rows.iter().map(|r| r.wk_end_date).max();
        let test = match last_date {
            Some(date) => self.filter(|r| r.wk_end_date == date),
            None => self.filter(|_| false),
        };
        let train = self.filter(|r| r.delta_target.is_some());
        (train, test)
    }

    /// Distinct locations in order of first appearance
    pub fn locations(&self) -> Vec<String> {
        distinct(self.rows.iter().map(|r| r.location.as_str()))
    }

    /// Distinct seasons in order of first appearance
    pub fn seasons(&self) -> Vec<String> {
        distinct(self.rows.iter().map(|r| r.season.as_str()))
    }

    /// Feature values as a dense matrix
    pub fn feature_matrix(&self) -> Result<FeatureMatrix> {
        let values = self
            .rows
            .iter()
            .flat_map(|r| r.features.iter().copied())
            .collect();
        Ok(FeatureMatrix::new(
            values,
            self.rows.len(),
            self.feature_names.len(),
        )?)
    }

    /// Target deltas of all rows; every row must have one
    pub fn targets(&self) -> Result<Vec<f64>> {
        self.rows
            .iter()
            .map(|r| {
                r.delta_target.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "missing delta_target for location {} on {}",
                        r.location, r.wk_end_date
                    ))
                })
            })
            .collect()
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

/// Loader for upstream feature tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a feature table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, feature_names: &[String]) -> Result<FeatureFrame> {
        let reader = csv::Reader::from_path(path)?;
        Self::read_table(reader, feature_names)
    }

    /// Load a feature table from any CSV source
    pub fn from_reader<R: Read>(source: R, feature_names: &[String]) -> Result<FeatureFrame> {
        Self::read_table(csv::Reader::from_reader(source), feature_names)
    }

    fn read_table<R: Read>(
        mut reader: csv::Reader<R>,
        feature_names: &[String],
    ) -> Result<FeatureFrame> {
        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                ForecastError::DataError(format!("required column {:?} not found", name))
            })
        };

        let required = REQUIRED_COLUMNS
            .iter()
            .map(|name| column(*name))
            .collect::<Result<Vec<usize>>>()?;
        let feature_cols = feature_names
            .iter()
            .map(|name| column(name.as_str()))
            .collect::<Result<Vec<usize>>>()?;

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let field = |i: usize| record.get(required[i]).unwrap_or("").trim();
            let ctx = |name: &str| format!("line {}, column {}", line + 2, name);

            let features = feature_cols
                .iter()
                .zip(feature_names)
                .map(|(&col, name)| {
                    let raw = record.get(col).unwrap_or("").trim();
                    parse_optional_f64(raw, &ctx(name)).map(|v| v.unwrap_or(f64::NAN))
                })
                .collect::<Result<Vec<f64>>>()?;

            rows.push(ObservationRow {
                source: field(0).to_string(),
                location: field(1).to_string(),
                wk_end_date: NaiveDate::parse_from_str(field(2), "%Y-%m-%d")?,
                pop: parse_f64(field(3), &ctx("pop"))?,
                season: field(4).to_string(),
                season_week: parse_u32(field(5), &ctx("season_week"))?,
                horizon: parse_u32(field(6), &ctx("horizon"))?,
                inc_trans_cs: parse_f64(field(7), &ctx("inc_trans_cs"))?,
                inc_trans_center_factor: parse_f64(field(8), &ctx("inc_trans_center_factor"))?,
                inc_trans_scale_factor: parse_f64(field(9), &ctx("inc_trans_scale_factor"))?,
                delta_target: parse_optional_f64(field(10), &ctx("delta_target"))?,
                features,
            });
        }

        FeatureFrame::new(feature_names.to_vec(), rows)
    }
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("na") || raw.eq_ignore_ascii_case("nan")
}

fn parse_optional_f64(raw: &str, ctx: &str) -> Result<Option<f64>> {
    if is_missing(raw) {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| ForecastError::DataError(format!("{}: {:?} is not a number", ctx, raw)))
}

fn parse_f64(raw: &str, ctx: &str) -> Result<f64> {
    parse_optional_f64(raw, ctx)?
        .filter(|v| v.is_finite())
        .ok_or_else(|| ForecastError::DataError(format!("{}: value is missing", ctx)))
}

fn parse_u32(raw: &str, ctx: &str) -> Result<u32> {
    // whole numbers may have been written as floats, e.g. "12.0"
    let value = parse_f64(raw, ctx)?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(ForecastError::DataError(format!(
            "{}: {} is not a non-negative whole number",
            ctx, value
        )));
    }
    Ok(value as u32)
}
