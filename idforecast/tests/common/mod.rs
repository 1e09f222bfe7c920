#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use forecast_math::BoosterParams;
use idforecast::config::{Disease, ModelConfig, RunConfig};
use idforecast::data::{FeatureFrame, ObservationRow};
use std::path::Path;

pub const N_SEASONS: usize = 5;
pub const WEEKS_PER_SEASON: usize = 30;
pub const MAX_HORIZON: u32 = 3;

pub fn feature_names() -> Vec<String> {
    vec![
        "inc_trans_cs".to_string(),
        "season_week".to_string(),
        "horizon".to_string(),
    ]
}

pub fn q_levels() -> Vec<f64> {
    vec![0.025, 0.5, 0.975]
}

pub fn q_labels() -> Vec<String> {
    vec!["0.025".to_string(), "0.5".to_string(), "0.975".to_string()]
}

pub fn first_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 10, 6).unwrap()
}

/// Latest week-ending date in the synthetic frame
pub fn last_date() -> NaiveDate {
    week_date(N_SEASONS - 1, WEEKS_PER_SEASON - 1)
}

/// Saturday one week after the latest observation
pub fn ref_date() -> NaiveDate {
    last_date() + Duration::days(7)
}

fn week_date(season: usize, week: usize) -> NaiveDate {
    first_date() + Duration::days(7 * (season * 52 + week) as i64)
}

fn signal(location: usize, season: usize, week: usize) -> f64 {
    let phase = week as f64 / WEEKS_PER_SEASON as f64 * std::f64::consts::PI;
    0.3 + 0.1 * location as f64 + 0.5 * phase.sin() + 0.05 * ((season * 7 + week * 3) % 5) as f64
}

fn row(
    source: &str,
    location: usize,
    season: usize,
    week: usize,
    horizon: u32,
) -> ObservationRow {
    let current = signal(location, season, week);
    let target_week = week + horizon as usize;
    let delta_target = if target_week < WEEKS_PER_SEASON {
        Some(signal(location, season, target_week) - current)
    } else {
        None
    };
    let season_week = (week + 5) as u32;

    ObservationRow {
        source: source.to_string(),
        location: format!("{:02}", location + 1),
        wk_end_date: week_date(season, week),
        pop: 1_000_000.0 * (location + 1) as f64,
        season: format!("{}/{}", 2018 + season, (19 + season) % 100),
        season_week,
        horizon,
        inc_trans_cs: current,
        inc_trans_center_factor: 0.5,
        inc_trans_scale_factor: 1.0,
        delta_target,
        features: vec![current, f64::from(season_week), f64::from(horizon)],
    }
}

/// Two nhsn locations plus an ilinet copy of location 01
pub fn synthetic_frame() -> FeatureFrame {
    let mut rows = Vec::new();
    for season in 0..N_SEASONS {
        for week in 0..WEEKS_PER_SEASON {
            for horizon in 1..=MAX_HORIZON {
                rows.push(row("nhsn", 0, season, week, horizon));
                rows.push(row("nhsn", 1, season, week, horizon));
                rows.push(row("ilinet", 0, season, week, horizon));
            }
        }
    }
    FeatureFrame::new(feature_names(), rows).unwrap()
}

pub fn small_booster() -> BoosterParams {
    BoosterParams {
        n_estimators: 15,
        max_leaves: 6,
        min_data_in_leaf: 10,
        ..BoosterParams::default()
    }
}

pub fn model_config(name: &str) -> ModelConfig {
    ModelConfig::new(name, 3, 0.6, feature_names())
        .unwrap()
        .with_booster(small_booster())
        .unwrap()
}

pub fn run_config(output_root: &Path) -> RunConfig {
    RunConfig::new(
        ref_date(),
        Disease::Flu,
        MAX_HORIZON,
        q_levels(),
        q_labels(),
        output_root,
    )
    .unwrap()
}
