//! Future forecasts from persisted models

use crate::config::HybridConfig;
use crate::data::{DataLoader, GroupKey, Observation};
use crate::error::{ForecastError, Result};
use crate::features::{build_feature_frame, CalendarFeatures, FeatureLayout, FeatureRow};
use crate::forecast::{blend, ForecastRecord};
use crate::models::{SeasonalInput, TrainedModel, TrainedResidualModel, TrainedSeasonalModel};
use crate::utils::future_weekly_dates;
use tracing::{info, warn};

/// Forecast `horizon` weeks past the group's last observed date.
///
/// Both artifacts are loaded before any data is read, so a missing model
/// fails with `MissingArtifact` straight away.
pub fn forecast_future(
    config: &HybridConfig,
    key: GroupKey,
    horizon: usize,
) -> Result<Vec<ForecastRecord>> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Horizon must be at least one week".to_string(),
        ));
    }

    let models_dir = config.models_dir();
    let seasonal = TrainedSeasonalModel::load_for_group(&models_dir, key)?;
    let residual = TrainedResidualModel::load_for_group(&models_dir, key)?;
    residual.ensure_layout(&FeatureLayout::from_config(&config.features))?;

    let frame = DataLoader::build_base_frame(config)?;
    let history = frame.group(key);
    if history.is_empty() {
        return Err(ForecastError::DataError(format!(
            "No history for Store {} Dept {}",
            key.store, key.dept
        )));
    }

    forecast_from_history(config, &seasonal, &residual, history, horizon)
}

/// Forecast from already-loaded models and one group's history
pub fn forecast_from_history(
    config: &HybridConfig,
    seasonal: &TrainedSeasonalModel,
    residual: &TrainedResidualModel,
    history: &[Observation],
    horizon: usize,
) -> Result<Vec<ForecastRecord>> {
    let frame = build_feature_frame(history, residual.layout())?;
    let last = frame
        .last()
        .ok_or_else(|| ForecastError::DataError("Cannot forecast from an empty history".to_string()))?;
    let key = last.key;

    let dates = future_weekly_dates(last.date, config.calendar.anchor_weekday, horizon);
    warn!("future holiday flags are assumed to be 0");
    warn!(
        last_date = %last.date,
        "exogenous, lag and rolling features are carried forward from the last observed row"
    );

    let inputs: Vec<SeasonalInput> = dates
        .iter()
        .map(|&date| SeasonalInput {
            date,
            is_holiday: 0,
        })
        .collect();
    let baseline = seasonal.predict(&inputs)?;

    let future_rows: Vec<FeatureRow> = dates
        .iter()
        .map(|&date| FeatureRow {
            key,
            date,
            target: None,
            is_holiday: 0,
            exogenous: last.exogenous,
            calendar: CalendarFeatures::from_date(date),
            lags: last.lags.clone(),
            rolling_means: last.rolling_means.clone(),
        })
        .collect();
    let residuals = residual.predict(&future_rows)?;

    let records = blend(key, &baseline, &residuals, &[])?;
    info!(
        store = key.store,
        dept = key.dept,
        horizon,
        "generated future forecast"
    );
    Ok(records)
}
