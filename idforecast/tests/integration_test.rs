mod common;

use common::*;
use idforecast::config::{Disease, RunConfig};
use idforecast::data::FeatureFrame;
use idforecast::hub::read_hub_csv;
use idforecast::importance::read_feature_importance;
use idforecast::models::{ForecastModel, GbqrModel};
use idforecast::{ForecastError, HubRow};
use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::fs;
use tempfile::tempdir;

fn forecast_rows(frame: &FeatureFrame, separately: bool) -> Vec<HubRow> {
    let dir = tempdir().unwrap();
    let config = model_config("gbqr_test").with_locations_fitted_separately(separately);
    let model = GbqrModel::new(config).unwrap();
    model
        .forecast(&run_config(dir.path()), frame)
        .unwrap()
        .hub_rows
}

#[test]
fn test_run_writes_hub_table_at_expected_path() {
    let dir = tempdir().unwrap();
    let run_config = run_config(&dir.path().join("model-output"));
    let model = GbqrModel::new(model_config("gbqr_test")).unwrap();

    let artifacts = model.run(&run_config, &synthetic_frame()).unwrap();

    let expected = dir
        .path()
        .join("model-output")
        .join("UMass-gbqr_test")
        .join("2023-04-29-UMass-gbqr_test.csv");
    assert_eq!(artifacts.forecast_path, expected);
    assert!(artifacts.importance_path.is_none());

    let contents = fs::read_to_string(&expected).unwrap();
    let header = contents.lines().next().unwrap();
    assert_eq!(
        header,
        "location,reference_date,horizon,target_end_date,target,output_type,output_type_id,value"
    );

    let rows = read_hub_csv(&expected).unwrap();
    assert_eq!(rows.len(), 2 * MAX_HORIZON as usize * q_levels().len());
}

#[test]
fn test_forecasts_are_reproducible() {
    let frame = synthetic_frame();
    let first = forecast_rows(&frame, false);
    let second = forecast_rows(&frame, false);
    assert_eq!(first, second);
}

#[test]
fn test_written_tables_are_identical_across_runs() {
    let frame = synthetic_frame();
    let model = GbqrModel::new(model_config("gbqr_test")).unwrap();

    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    let path_a = model.run(&run_config(a.path()), &frame).unwrap().forecast_path;
    let path_b = model.run(&run_config(b.path()), &frame).unwrap().forecast_path;

    assert_eq!(fs::read(path_a).unwrap(), fs::read(path_b).unwrap());
}

#[test]
fn test_output_schema_and_invariants() {
    let rows = forecast_rows(&synthetic_frame(), false);
    let ref_date = ref_date();

    // one row per published test observation and quantile level
    assert_eq!(rows.len(), 2 * MAX_HORIZON as usize * 3);
    let keys: HashSet<(String, i64, String)> = rows
        .iter()
        .map(|r| (r.location.clone(), r.horizon, r.output_type_id.clone()))
        .collect();
    assert_eq!(keys.len(), rows.len());

    let locations: HashSet<&str> = rows.iter().map(|r| r.location.as_str()).collect();
    assert_eq!(locations, HashSet::from(["01", "02"]));

    for row in &rows {
        assert!(row.value >= 0.0);
        assert_eq!(row.reference_date, ref_date);
        assert_eq!(row.target, "wk inc flu hosp");
        assert_eq!(row.output_type, "quantile");

        let days = (row.target_end_date - row.reference_date).num_days();
        assert_eq!(days % 7, 0);
        assert_eq!(row.horizon, days / 7);
        assert!((0..MAX_HORIZON as i64).contains(&row.horizon));
    }

    let mut groups: HashMap<(String, i64), Vec<(f64, f64)>> = HashMap::new();
    for row in &rows {
        groups
            .entry((row.location.clone(), row.horizon))
            .or_default()
            .push((row.output_type_id.parse().unwrap(), row.value));
    }
    for (_, mut group) in groups {
        group.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert!(group.windows(2).all(|w| w[0].1 <= w[1].1));
    }
}

#[test]
fn test_fit_locations_separately() {
    let rows = forecast_rows(&synthetic_frame(), true);
    assert_eq!(rows.len(), 2 * MAX_HORIZON as usize * 3);

    // per-location fits are concatenated in order of first appearance
    let first_02 = rows.iter().position(|r| r.location == "02").unwrap();
    assert!(rows[..first_02].iter().all(|r| r.location == "01"));
    assert!(rows[first_02..].iter().all(|r| r.location == "02"));
}

#[test]
fn test_location_filter_restricts_output() {
    let dir = tempdir().unwrap();
    let run_config = run_config(dir.path()).with_locations(vec!["02".to_string()]);
    let model = GbqrModel::new(model_config("gbqr_test")).unwrap();

    let output = model.forecast(&run_config, &synthetic_frame()).unwrap();
    assert!(!output.hub_rows.is_empty());
    assert!(output.hub_rows.iter().all(|r| r.location == "02"));
}

#[test]
fn test_feature_importance_export() {
    let dir = tempdir().unwrap();
    let run_config = run_config(&dir.path().join("model-output"))
        .with_feature_importance(dir.path().join("artifact-store"));
    let model = GbqrModel::new(model_config("gbqr_test")).unwrap();

    let artifacts = model.run(&run_config, &synthetic_frame()).unwrap();
    let path = artifacts.importance_path.unwrap();
    assert_eq!(
        path,
        dir.path()
            .join("artifact-store")
            .join("UMass-gbqr_test")
            .join("feat_importance")
            .join("2023-04-29-UMass-gbqr_test.csv")
    );

    let records = read_feature_importance(&path).unwrap();
    assert_eq!(records.len(), 3 * 3 * feature_names().len());
    let order: Vec<(usize, f64)> = records
        .iter()
        .map(|r| (r.bag_index, r.quantile_level))
        .collect();
    let mut sorted = order.clone();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
    assert_eq!(order, sorted);
}

#[test]
fn test_feature_importance_per_location_follows_location_order() {
    let dir = tempdir().unwrap();
    let run_config = run_config(&dir.path().join("model-output"))
        .with_feature_importance(dir.path().join("artifact-store"));
    let model =
        GbqrModel::new(model_config("gbqr_test").with_locations_fitted_separately(true)).unwrap();
    assert!(model.config().fit_locations_separately());
    let n_bags = model.config().num_bags();

    let artifacts = model.run(&run_config, &synthetic_frame()).unwrap();
    let records = read_feature_importance(artifacts.importance_path.unwrap()).unwrap();

    // one (bag, quantile, feature) block per location, locations in order
    let mut expected = Vec::new();
    for _location in ["01", "02"] {
        for bag in 0..n_bags {
            for level in q_levels() {
                for feat in feature_names() {
                    expected.push((bag, level, feat));
                }
            }
        }
    }
    let actual: Vec<(usize, f64, String)> = records
        .iter()
        .map(|r| (r.bag_index, r.quantile_level, r.feat.clone()))
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_covid_target_label() {
    let dir = tempdir().unwrap();
    let run_config = RunConfig::new(
        ref_date(),
        Disease::Covid,
        MAX_HORIZON,
        q_levels(),
        q_labels(),
        dir.path(),
    )
    .unwrap();
    let model = GbqrModel::new(model_config("gbqr_test")).unwrap();
    let output = model.forecast(&run_config, &synthetic_frame()).unwrap();
    assert!(output
        .hub_rows
        .iter()
        .all(|r| r.target == "wk inc covid hosp"));
}

#[test]
fn test_location_without_training_rows_fails_when_fitting_separately() {
    let frame = synthetic_frame();
    let last = last_date();
    // location 02 keeps only its untrainable latest rows
    let frame = frame.filter(|r| r.location != "02" || r.wk_end_date == last);

    let dir = tempdir().unwrap();
    let model = GbqrModel::new(model_config("gbqr_test").with_locations_fitted_separately(true))
        .unwrap();
    let err = model.forecast(&run_config(dir.path()), &frame).unwrap_err();
    assert!(matches!(err, ForecastError::DataError(_)));
}

#[test]
fn test_empty_frame_is_a_data_error() {
    let dir = tempdir().unwrap();
    let frame = FeatureFrame::new(feature_names(), Vec::new()).unwrap();
    let model = GbqrModel::new(model_config("gbqr_test")).unwrap();
    let err = model.forecast(&run_config(dir.path()), &frame).unwrap_err();
    assert!(matches!(err, ForecastError::DataError(_)));
}
