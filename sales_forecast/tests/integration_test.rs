use chrono::{Duration, NaiveDate};
use indicatif::ProgressBar;
use pretty_assertions::assert_eq;
use sales_forecast::dashboard::{list_groups, load_group_forecast, load_metrics, MetricsPanel};
use sales_forecast::synthetic::{write_demo_data, SyntheticSpec};
use sales_forecast::utils::read_csv;
use sales_forecast::{
    evaluate, forecast_future, run_training, train_one_group, DataLoader, ForecastError, ForecastRecord, GroupKey,
    HybridConfig, MetricsRecord,
};
use std::path::Path;
use tempfile::tempdir;

fn config_in(dir: &Path) -> HybridConfig {
    let mut config = HybridConfig::default();
    config.paths.data_dir = dir.join("data");
    config.paths.output_dir = dir.join("outputs");
    config
}

fn one_group_spec() -> SyntheticSpec {
    SyntheticSpec {
        stores: 1,
        depts: 1,
        weeks: 156,
        ..SyntheticSpec::default()
    }
}

#[test]
fn test_hybrid_beats_seasonal_on_learnable_residual() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    write_demo_data(&config.paths.data_dir, &one_group_spec()).unwrap();

    let frame = DataLoader::build_base_frame(&config).unwrap();
    let rows = frame.group(GroupKey::new(1, 1));
    assert_eq!(rows.len(), 156);

    let output = train_one_group(&config, rows).unwrap();
    let metrics = &output.metrics;
    assert!(
        metrics.mae_hybrid <= metrics.mae_prophet,
        "hybrid {} vs prophet {}",
        metrics.mae_hybrid,
        metrics.mae_prophet
    );

    // every forecast row is in the test period and blends exactly
    assert!(!output.forecasts.is_empty());
    for row in &output.forecasts {
        assert!(row.date >= config.calendar.test_start);
        assert!(row.weekly_sales.is_some());
        assert_eq!(row.yhat_hybrid, row.yhat + row.residual_pred);
    }
}

#[test]
fn test_train_then_forecast_twelve_weeks() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.booster.n_estimators = 100;
    write_demo_data(&config.paths.data_dir, &one_group_spec()).unwrap();

    let summary = run_training(&config, None, &ProgressBar::hidden()).unwrap();
    assert_eq!(summary.trained(), 1);
    assert!(summary.failed.is_empty());

    let key = GroupKey::new(1, 1);
    assert!(config.models_dir().join("prophet_1_1.json").exists());
    assert!(config.models_dir().join("xgb_1_1.json").exists());

    let persisted: Vec<ForecastRecord> = read_csv(&config.forecast_path(key)).unwrap();
    for row in &persisted {
        assert_eq!(row.yhat_hybrid, row.yhat + row.residual_pred);
    }

    let last_date = NaiveDate::from_ymd_opt(2010, 2, 5).unwrap() + Duration::weeks(155);
    let future = forecast_future(&config, key, 12).unwrap();
    assert_eq!(future.len(), 12);
    assert!(future[0].date > last_date);
    assert_eq!(future[0].date, last_date + Duration::weeks(1));
    for pair in future.windows(2) {
        assert_eq!(pair[1].date - pair[0].date, Duration::days(7));
    }
    for row in &future {
        assert_eq!(row.key(), key);
        assert_eq!(row.weekly_sales, None);
        assert_eq!(row.yhat_hybrid, row.yhat + row.residual_pred);
    }
}

#[test]
fn test_forecast_without_models_is_missing_artifact() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());

    let err = forecast_future(&config, GroupKey::new(7, 3), 12).unwrap_err();
    assert!(err.is_missing_artifact(), "{err}");
    assert!(err.to_string().contains("prophet_7_3"));
}

#[test]
fn test_zero_horizon_rejected() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    assert!(forecast_future(&config, GroupKey::new(1, 1), 0).is_err());
}

#[test]
fn test_group_cap_and_dashboard() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.booster.n_estimators = 40;
    let spec = SyntheticSpec {
        stores: 2,
        depts: 2,
        weeks: 120,
        ..SyntheticSpec::default()
    };
    write_demo_data(&config.paths.data_dir, &spec).unwrap();

    let summary = run_training(&config, Some(2), &ProgressBar::hidden()).unwrap();
    assert_eq!(summary.trained(), 2);

    let metrics: Vec<MetricsRecord> = load_metrics(&config).unwrap();
    let keys: Vec<GroupKey> = metrics.iter().map(MetricsRecord::key).collect();
    assert_eq!(keys, vec![GroupKey::new(1, 1), GroupKey::new(1, 2)]);

    let groups = list_groups(&config.forecasts_dir()).unwrap();
    assert_eq!(groups, keys);

    let records = load_group_forecast(&config, groups[1]).unwrap();
    assert!(records.iter().all(|r| r.key() == groups[1]));
    let panel = MetricsPanel::for_group(&metrics, groups[1]).unwrap();
    assert_eq!(panel.mae.hybrid, Some(metrics[1].mae_hybrid));

    let summary = evaluate(&config).unwrap();
    assert_eq!(summary.groups, 2);
    assert!(summary.mean("mae_hybrid").is_some());
}

#[test]
fn test_groups_without_test_period_are_skipped() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    // 80 weeks from 2010-02-05 ends before the 2012-01-06 cutoff
    let spec = SyntheticSpec {
        stores: 1,
        depts: 2,
        weeks: 80,
        ..SyntheticSpec::default()
    };
    write_demo_data(&config.paths.data_dir, &spec).unwrap();

    let summary = run_training(&config, None, &ProgressBar::hidden()).unwrap();
    assert_eq!(summary.trained(), 0);
    assert_eq!(summary.failed.len(), 2);

    let table = std::fs::read_to_string(config.metrics_path()).unwrap();
    assert_eq!(table.trim_end(), MetricsRecord::COLUMNS.join(","));

    let err = evaluate(&config).unwrap_err();
    assert!(matches!(err, ForecastError::DataError(_)));
    assert!(err.to_string().contains("no trained groups"));
}
