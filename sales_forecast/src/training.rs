//! Per-group hybrid training
//!
//! For each (Store, Dept) group the seasonal baseline is fitted on the rows
//! before `calendar.test_start`, its in-sample error becomes the target of
//! the residual booster, and both are scored on the held-out rows.

use crate::config::HybridConfig;
use crate::data::{train_test_split, DataLoader, GroupKey, Observation};
use crate::error::{ForecastError, Result};
use crate::features::{build_feature_frame, FeatureRow};
use crate::forecast::{blend, ForecastRecord};
use crate::metrics::{evaluate_forecast, MetricsRecord};
use crate::models::{
    ForecastModel, ResidualModel, SeasonalInput, SeasonalModel, TrainedModel, TrainedResidualModel,
    TrainedSeasonalModel,
};
use crate::utils::{ensure_dirs, write_csv, write_table};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use std::collections::HashMap;
use tracing::{info, warn};

/// Everything one group's training produces
#[derive(Debug)]
pub struct GroupTrainingOutput {
    pub key: GroupKey,
    pub seasonal: TrainedSeasonalModel,
    pub residual: TrainedResidualModel,
    /// Test-period rows, actuals included
    pub forecasts: Vec<ForecastRecord>,
    pub metrics: MetricsRecord,
}

/// Fit both models for one group and score them on its test period
pub fn train_one_group(config: &HybridConfig, rows: &[Observation]) -> Result<GroupTrainingOutput> {
    let key = rows
        .first()
        .map(Observation::key)
        .ok_or_else(|| ForecastError::DataError("Cannot train on an empty group".to_string()))?;
    if rows.iter().any(|r| r.key() != key) {
        return Err(ForecastError::DataError(format!(
            "Rows for group {key} contain other groups"
        )));
    }

    let mut rows = rows.to_vec();
    rows.sort_by_key(|r| r.date);

    let (train, test) = train_test_split(&rows, config.calendar.test_start);
    if train.is_empty() || test.is_empty() {
        return Err(ForecastError::DataError(format!(
            "Group {key} has {} train and {} test rows around {}",
            train.len(),
            test.len(),
            config.calendar.test_start
        )));
    }

    let train_inputs: Vec<SeasonalInput> = train.iter().map(SeasonalInput::from).collect();
    let train_actuals: Vec<f64> = train.iter().map(|r| r.weekly_sales).collect();
    let test_inputs: Vec<SeasonalInput> = test.iter().map(SeasonalInput::from).collect();
    let test_actuals: Vec<f64> = test.iter().map(|r| r.weekly_sales).collect();

    let seasonal = SeasonalModel::from_config(&config.seasonal).fit(&train_inputs, &train_actuals)?;
    let baseline_test = seasonal.predict(&test_inputs)?;
    let baseline_train = seasonal.predict(&train_inputs)?;

    let residual_by_date: HashMap<NaiveDate, f64> = baseline_train
        .iter()
        .zip(&train_actuals)
        .map(|(base, actual)| (base.date, actual - base.yhat))
        .filter(|(_, residual)| residual.is_finite())
        .collect();

    let residual_spec = ResidualModel::from_config(config);
    let frame = build_feature_frame(&rows, residual_spec.layout())?;
    let (train_features, residual_targets): (Vec<FeatureRow>, Vec<f64>) = frame
        .iter()
        .filter(|r| r.date < config.calendar.test_start)
        .filter_map(|r| residual_by_date.get(&r.date).map(|res| (r.clone(), *res)))
        .unzip();
    let test_features: Vec<FeatureRow> = frame
        .into_iter()
        .filter(|r| r.date >= config.calendar.test_start)
        .collect();

    let residual = residual_spec.fit(&train_features, &residual_targets)?;
    let residual_pred = residual.predict(&test_features)?;

    let forecasts = blend(key, &baseline_test, &residual_pred, &test_actuals)?;
    let baseline_pred: Vec<f64> = forecasts.iter().map(|f| f.yhat).collect();
    let hybrid_pred: Vec<f64> = forecasts.iter().map(|f| f.yhat_hybrid).collect();
    let metrics = MetricsRecord::new(
        key,
        &evaluate_forecast(&test_actuals, &baseline_pred)?,
        &evaluate_forecast(&test_actuals, &hybrid_pred)?,
    );

    Ok(GroupTrainingOutput {
        key,
        seasonal,
        residual,
        forecasts,
        metrics,
    })
}

/// Outcome of one training run
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    pub metrics: Vec<MetricsRecord>,
    /// Groups skipped because training failed, with the reason
    pub failed: Vec<(GroupKey, String)>,
}

impl TrainingSummary {
    pub fn trained(&self) -> usize {
        self.metrics.len()
    }
}

/// Write both models and the test-period forecast table of one group
pub fn persist_group(config: &HybridConfig, output: &GroupTrainingOutput) -> Result<()> {
    let models_dir = config.models_dir();
    output.seasonal.save_for_group(&models_dir, output.key)?;
    output.residual.save_for_group(&models_dir, output.key)?;
    write_csv(&config.forecast_path(output.key), &output.forecasts)
}

/// Train groups in (Store, Dept) order until `limit` succeed.
///
/// `limit` of `None` uses `training.group_limit`; 0 trains every group.
/// Failed groups are logged and skipped. `metrics.csv` holds this run's rows.
pub fn run_training(
    config: &HybridConfig,
    limit: Option<usize>,
    progress: &ProgressBar,
) -> Result<TrainingSummary> {
    ensure_dirs(config)?;
    let frame = DataLoader::build_base_frame(config)?;
    let keys = frame.group_keys();
    let limit = limit.unwrap_or(config.training.group_limit);
    let cap = if limit == 0 { keys.len() } else { limit.min(keys.len()) };
    progress.set_length(cap as u64);

    let mut summary = TrainingSummary::default();
    for (key, rows) in frame.groups() {
        if summary.trained() >= cap {
            break;
        }
        info!(store = key.store, dept = key.dept, rows = rows.len(), "training group");

        match train_one_group(config, rows) {
            Ok(output) => {
                persist_group(config, &output)?;
                info!(
                    store = key.store,
                    dept = key.dept,
                    mae_prophet = output.metrics.mae_prophet,
                    mae_hybrid = output.metrics.mae_hybrid,
                    "trained group"
                );
                summary.metrics.push(output.metrics);
                progress.inc(1);
            }
            Err(e) => {
                warn!(store = key.store, dept = key.dept, error = %e, "skipping group");
                summary.failed.push((key, e.to_string()));
            }
        }
    }
    progress.finish_and_clear();

    write_table(&config.metrics_path(), &MetricsRecord::COLUMNS, &summary.metrics)?;
    info!(
        trained = summary.trained(),
        failed = summary.failed.len(),
        path = %config.metrics_path().display(),
        "wrote metrics"
    );
    Ok(summary)
}
