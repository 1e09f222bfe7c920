//! Model and run configuration
//!
//! Both configurations are validated once when they are built (or parsed
//! from JSON) and are read-only afterwards. Components receive them by
//! reference.

use crate::error::{ForecastError, Result};
use crate::utils::validate_ref_date;
use chrono::{Local, NaiveDate};
use forecast_math::BoosterParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Provider prefix used in output directory and file names
pub const DEFAULT_PROVIDER: &str = "UMass";

/// Source whose rows are published in the hub table
pub const DEFAULT_TARGET_SOURCE: &str = "nhsn";

/// Variance-stabilizing transform applied upstream to the surveillance signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum PowerTransform {
    /// No power transform
    #[default]
    Identity,
    /// Fourth-root transform, inverted by raising to the fourth power
    FourthRoot,
}

/// Constants that belong to one forward transform convention
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformConstants {
    /// Power that undoes the forward transform
    pub inv_power: i32,
    /// Added to the per-series scale factor before rescaling
    pub scale_stabilizer: f64,
    /// Offset added before the forward transform, subtracted after inversion
    pub floor_offset: f64,
}

impl PowerTransform {
    /// Parse a transform name; `"4rt"` and `"none"` are recognized
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "4rt" => Ok(PowerTransform::FourthRoot),
            "none" => Ok(PowerTransform::Identity),
            other => Err(ForecastError::ConfigError(format!(
                "unsupported power_transform {:?}: must be \"4rt\" or none",
                other
            ))),
        }
    }

    /// Name used in configuration files
    pub fn name(&self) -> Option<&'static str> {
        match self {
            PowerTransform::Identity => None,
            PowerTransform::FourthRoot => Some("4rt"),
        }
    }

    /// Constants paired with this transform
    pub fn constants(&self) -> TransformConstants {
        let floor_offset = 0.01 + 0.75_f64.powi(4);
        match self {
            PowerTransform::Identity => TransformConstants {
                inv_power: 1,
                scale_stabilizer: 0.01,
                floor_offset,
            },
            PowerTransform::FourthRoot => TransformConstants {
                inv_power: 4,
                scale_stabilizer: 0.01,
                floor_offset,
            },
        }
    }
}

impl FromStr for PowerTransform {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl TryFrom<Option<String>> for PowerTransform {
    type Error = ForecastError;

    fn try_from(value: Option<String>) -> Result<Self> {
        match value {
            None => Ok(PowerTransform::Identity),
            Some(name) => Self::from_name(&name),
        }
    }
}

impl From<PowerTransform> for Option<String> {
    fn from(value: PowerTransform) -> Self {
        value.name().map(str::to_string)
    }
}

/// Disease being forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disease {
    Flu,
    Covid,
}

impl Disease {
    /// Lower-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Disease::Flu => "flu",
            Disease::Covid => "covid",
        }
    }

    /// Hub target label, e.g. `wk inc flu hosp`
    pub fn target_label(&self) -> String {
        format!("wk inc {} hosp", self.as_str())
    }

    /// Whether a season week is part of the modelled season
    pub fn in_season(&self, season_week: u32) -> bool {
        match self {
            Disease::Flu => (5..=45).contains(&season_week),
            Disease::Covid => true,
        }
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disease {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flu" => Ok(Disease::Flu),
            "covid" => Ok(Disease::Covid),
            other => Err(ForecastError::ConfigError(format!(
                "unsupported disease {:?}: must be \"flu\" or \"covid\"",
                other
            ))),
        }
    }
}

fn default_target_source() -> String {
    DEFAULT_TARGET_SOURCE.to_string()
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

/// Serialized form of [`ModelConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model_name: String,
    pub num_bags: usize,
    pub bag_frac_samples: f64,
    #[serde(default)]
    pub fit_locations_separately: bool,
    #[serde(default)]
    pub power_transform: PowerTransform,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub feature_groups: Option<Vec<String>>,
    #[serde(default = "default_target_source")]
    pub target_source: String,
    #[serde(default)]
    pub booster: BoosterParams,
}

/// Parameters of one GBQR model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelSettings")]
pub struct ModelConfig {
    model_name: String,
    num_bags: usize,
    bag_frac_samples: f64,
    fit_locations_separately: bool,
    power_transform: PowerTransform,
    feature_names: Vec<String>,
    feature_groups: Option<Vec<String>>,
    target_source: String,
    booster: BoosterParams,
}

impl ModelConfig {
    /// Create a model configuration with default transform, source and booster settings
    pub fn new(
        model_name: impl Into<String>,
        num_bags: usize,
        bag_frac_samples: f64,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        ModelSettings {
            model_name: model_name.into(),
            num_bags,
            bag_frac_samples,
            fit_locations_separately: false,
            power_transform: PowerTransform::default(),
            feature_names,
            feature_groups: None,
            target_source: default_target_source(),
            booster: BoosterParams::default(),
        }
        .try_into()
    }

    /// Load and validate a model configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Fit each location on its own data instead of jointly
    pub fn with_locations_fitted_separately(mut self, separately: bool) -> Self {
        self.fit_locations_separately = separately;
        self
    }

    /// Set the power transform the inputs were built with
    pub fn with_power_transform(mut self, transform: PowerTransform) -> Self {
        self.power_transform = transform;
        self
    }

    /// Restrict features to those whose name starts with one of `groups`
    pub fn with_feature_groups(mut self, groups: Vec<String>) -> Result<Self> {
        self.feature_groups = Some(groups);
        self.validate()?;
        Ok(self)
    }

    /// Set the source whose rows are published
    pub fn with_target_source(mut self, source: impl Into<String>) -> Self {
        self.target_source = source.into();
        self
    }

    /// Set the booster hyperparameters
    pub fn with_booster(mut self, booster: BoosterParams) -> Result<Self> {
        self.booster = booster;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(ForecastError::ConfigError(
                "model_name must not be empty".to_string(),
            ));
        }
        if self.num_bags == 0 {
            return Err(ForecastError::ConfigError(
                "num_bags must be at least 1".to_string(),
            ));
        }
        if !(self.bag_frac_samples > 0.0 && self.bag_frac_samples <= 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "bag_frac_samples must be within (0, 1], got {}",
                self.bag_frac_samples
            )));
        }
        if self.feature_names.is_empty() {
            return Err(ForecastError::ConfigError(
                "feature_names must not be empty".to_string(),
            ));
        }
        if self.selected_features().is_empty() {
            return Err(ForecastError::ConfigError(
                "feature_groups exclude every feature".to_string(),
            ));
        }
        self.booster
            .validate()
            .map_err(|e| ForecastError::ConfigError(e.to_string()))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn num_bags(&self) -> usize {
        self.num_bags
    }

    pub fn bag_frac_samples(&self) -> f64 {
        self.bag_frac_samples
    }

    pub fn fit_locations_separately(&self) -> bool {
        self.fit_locations_separately
    }

    pub fn power_transform(&self) -> PowerTransform {
        self.power_transform
    }

    /// All feature columns supplied by the upstream feature table
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn feature_groups(&self) -> Option<&[String]> {
        self.feature_groups.as_deref()
    }

    pub fn target_source(&self) -> &str {
        &self.target_source
    }

    pub fn booster(&self) -> &BoosterParams {
        &self.booster
    }

    /// Feature columns the model is trained on, after group selection
    pub fn selected_features(&self) -> Vec<String> {
        match &self.feature_groups {
            None => self.feature_names.clone(),
            Some(groups) => self
                .feature_names
                .iter()
                .filter(|name| groups.iter().any(|g| name.starts_with(g.as_str())))
                .cloned()
                .collect(),
        }
    }
}

impl TryFrom<ModelSettings> for ModelConfig {
    type Error = ForecastError;

    fn try_from(settings: ModelSettings) -> Result<Self> {
        let config = ModelConfig {
            model_name: settings.model_name,
            num_bags: settings.num_bags,
            bag_frac_samples: settings.bag_frac_samples,
            fit_locations_separately: settings.fit_locations_separately,
            power_transform: settings.power_transform,
            feature_names: settings.feature_names,
            feature_groups: settings.feature_groups,
            target_source: settings.target_source,
            booster: settings.booster,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Serialized form of [`RunConfig`]; a missing `ref_date` means the next Saturday
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub ref_date: Option<NaiveDate>,
    pub disease: Disease,
    pub max_horizon: u32,
    pub q_levels: Vec<f64>,
    pub q_labels: Vec<String>,
    #[serde(default)]
    pub locations: Option<Vec<String>>,
    pub output_root: PathBuf,
    #[serde(default)]
    pub artifact_store_root: Option<PathBuf>,
    #[serde(default)]
    pub save_feat_importance: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
}

/// Parameters of one forecast run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    ref_date: NaiveDate,
    disease: Disease,
    max_horizon: u32,
    q_levels: Vec<f64>,
    q_labels: Vec<String>,
    locations: Option<Vec<String>>,
    output_root: PathBuf,
    artifact_store_root: Option<PathBuf>,
    save_feat_importance: bool,
    provider: String,
}

impl RunConfig {
    /// Create a run configuration; `ref_date` must be a Saturday
    pub fn new(
        ref_date: NaiveDate,
        disease: Disease,
        max_horizon: u32,
        q_levels: Vec<f64>,
        q_labels: Vec<String>,
        output_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let settings = RunSettings {
            ref_date: Some(ref_date),
            disease,
            max_horizon,
            q_levels,
            q_labels,
            locations: None,
            output_root: output_root.into(),
            artifact_store_root: None,
            save_feat_importance: false,
            provider: default_provider(),
        };
        Self::from_settings(settings, Local::now().date_naive())
    }

    /// Validate settings, resolving a missing reference date relative to `today`
    pub fn from_settings(settings: RunSettings, today: NaiveDate) -> Result<Self> {
        let ref_date = validate_ref_date(settings.ref_date, today)?;
        validate_quantiles(&settings.q_levels, &settings.q_labels)?;
        if settings.max_horizon == 0 {
            return Err(ForecastError::ConfigError(
                "max_horizon must be at least 1".to_string(),
            ));
        }
        if settings.save_feat_importance && settings.artifact_store_root.is_none() {
            return Err(ForecastError::ConfigError(
                "save_feat_importance requires artifact_store_root".to_string(),
            ));
        }
        if settings.provider.trim().is_empty() {
            return Err(ForecastError::ConfigError(
                "provider must not be empty".to_string(),
            ));
        }

        Ok(Self {
            ref_date,
            disease: settings.disease,
            max_horizon: settings.max_horizon,
            q_levels: settings.q_levels,
            q_labels: settings.q_labels,
            locations: settings.locations,
            output_root: settings.output_root,
            artifact_store_root: settings.artifact_store_root,
            save_feat_importance: settings.save_feat_importance,
            provider: settings.provider,
        })
    }

    /// Load and validate a run configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let settings: RunSettings = serde_json::from_reader(reader)?;
        Self::from_settings(settings, Local::now().date_naive())
    }

    /// Replace the reference date; it must be a Saturday
    pub fn with_ref_date(mut self, ref_date: NaiveDate) -> Result<Self> {
        self.ref_date = validate_ref_date(Some(ref_date), ref_date)?;
        Ok(self)
    }

    /// Only forecast the given locations
    pub fn with_locations(mut self, locations: Vec<String>) -> Self {
        self.locations = Some(locations);
        self
    }

    /// Write feature importance tables under `root`
    pub fn with_feature_importance(mut self, root: impl Into<PathBuf>) -> Self {
        self.artifact_store_root = Some(root.into());
        self.save_feat_importance = true;
        self
    }

    /// Set the provider prefix used in output names
    pub fn with_provider(mut self, provider: impl Into<String>) -> Result<Self> {
        let provider = provider.into();
        if provider.trim().is_empty() {
            return Err(ForecastError::ConfigError(
                "provider must not be empty".to_string(),
            ));
        }
        self.provider = provider;
        Ok(self)
    }

    pub fn ref_date(&self) -> NaiveDate {
        self.ref_date
    }

    pub fn disease(&self) -> Disease {
        self.disease
    }

    pub fn max_horizon(&self) -> u32 {
        self.max_horizon
    }

    pub fn q_levels(&self) -> &[f64] {
        &self.q_levels
    }

    pub fn q_labels(&self) -> &[String] {
        &self.q_labels
    }

    pub fn locations(&self) -> Option<&[String]> {
        self.locations.as_deref()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn artifact_store_root(&self) -> Option<&Path> {
        self.artifact_store_root.as_deref()
    }

    pub fn save_feat_importance(&self) -> bool {
        self.save_feat_importance
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

fn validate_quantiles(levels: &[f64], labels: &[String]) -> Result<()> {
    if levels.is_empty() {
        return Err(ForecastError::ConfigError(
            "at least one quantile level is required".to_string(),
        ));
    }
    if levels.len() != labels.len() {
        return Err(ForecastError::ConfigError(format!(
            "{} quantile levels but {} labels",
            levels.len(),
            labels.len()
        )));
    }
    for (level, label) in levels.iter().zip(labels) {
        if !(*level > 0.0 && *level < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "quantile level {} is outside (0, 1)",
                level
            )));
        }
        let parsed: f64 = label.parse().map_err(|_| {
            ForecastError::ConfigError(format!("quantile label {:?} is not a number", label))
        })?;
        if (parsed - level).abs() > 1e-9 {
            return Err(ForecastError::ConfigError(format!(
                "quantile label {:?} does not match level {}",
                label, level
            )));
        }
    }
    if levels.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ForecastError::ConfigError(
            "quantile levels must be unique and increasing".to_string(),
        ));
    }
    Ok(())
}
