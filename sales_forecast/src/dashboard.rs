//! View-model behind the interactive dashboard
//!
//! Group selection, the seasonal/hybrid overlay toggle, the metrics panel with
//! deltas against the baseline, the bounded horizon control and the CSV
//! exports. Rendering is left to the caller.

use crate::config::HybridConfig;
use crate::data::GroupKey;
use crate::error::{ForecastError, Result};
use crate::forecast::ForecastRecord;
use crate::inference::forecast_future;
use crate::metrics::MetricsRecord;
use crate::utils::{read_csv, round3, write_csv};
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Groups that have a `preds_{store}_{dept}.csv`, sorted
pub fn list_groups(forecasts_dir: &Path) -> Result<Vec<GroupKey>> {
    let no_forecasts =
        || ForecastError::DataError("No forecasts found. Run hybrid_train first.".to_string());
    if !forecasts_dir.is_dir() {
        return Err(no_forecasts());
    }

    let mut groups = Vec::new();
    for entry in fs::read_dir(forecasts_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if let Some(key) = stem.strip_prefix("preds_").and_then(|k| k.parse().ok()) {
            groups.push(key);
        }
    }

    if groups.is_empty() {
        return Err(no_forecasts());
    }
    groups.sort();
    Ok(groups)
}

pub fn load_group_forecast(config: &HybridConfig, key: GroupKey) -> Result<Vec<ForecastRecord>> {
    read_csv(&config.forecast_path(key))
}

pub fn load_metrics(config: &HybridConfig) -> Result<Vec<MetricsRecord>> {
    read_csv(&config.metrics_path())
}

/// Which predicted series is overlaid on the actuals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForecastView {
    #[default]
    Hybrid,
    Seasonal,
}

impl ForecastView {
    pub fn label(self) -> &'static str {
        match self {
            ForecastView::Hybrid => "Hybrid (Prophet + XGBoost)",
            ForecastView::Seasonal => "Prophet only",
        }
    }

    pub fn predicted(self, record: &ForecastRecord) -> f64 {
        match self {
            ForecastView::Hybrid => record.yhat_hybrid,
            ForecastView::Seasonal => record.yhat,
        }
    }
}

impl FromStr for ForecastView {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hybrid" => Ok(ForecastView::Hybrid),
            "seasonal" | "prophet" => Ok(ForecastView::Seasonal),
            other => Err(format!("unknown view '{other}', expected hybrid or seasonal")),
        }
    }
}

/// One point of the actual-vs-predicted chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPoint {
    pub date: NaiveDate,
    pub actual: Option<f64>,
    pub predicted: f64,
}

pub fn overlay(records: &[ForecastRecord], view: ForecastView) -> Vec<OverlayPoint> {
    records
        .iter()
        .map(|r| OverlayPoint {
            date: r.date,
            actual: r.weekly_sales,
            predicted: view.predicted(r),
        })
        .collect()
}

/// One row of the future-forecast panel: baseline and hybrid side by side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuturePoint {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_hybrid: f64,
}

pub fn future_comparison(records: &[ForecastRecord]) -> Vec<FuturePoint> {
    records
        .iter()
        .map(|r| FuturePoint {
            date: r.date,
            yhat: r.yhat,
            yhat_hybrid: r.yhat_hybrid,
        })
        .collect()
}

/// A hybrid metric and how much it improved on the baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricDelta {
    pub hybrid: Option<f64>,
    /// Baseline minus hybrid
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsPanel {
    pub key: GroupKey,
    pub mae: MetricDelta,
    pub rmse: MetricDelta,
    pub mape: MetricDelta,
}

impl MetricsPanel {
    pub fn from_record(record: &MetricsRecord) -> Self {
        Self {
            key: record.key(),
            mae: MetricDelta {
                hybrid: Some(record.mae_hybrid),
                delta: Some(record.mae_delta()),
            },
            rmse: MetricDelta {
                hybrid: Some(record.rmse_hybrid),
                delta: Some(record.rmse_delta()),
            },
            mape: MetricDelta {
                hybrid: record.mape_hybrid,
                delta: record.mape_delta(),
            },
        }
    }

    /// Panel for `key`, if the metrics table has a row for it
    pub fn for_group(records: &[MetricsRecord], key: GroupKey) -> Option<Self> {
        records.iter().find(|r| r.key() == key).map(Self::from_record)
    }
}

impl fmt::Display for MetricsPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("MAE (Hybrid)", self.mae, ""),
            ("RMSE (Hybrid)", self.rmse, ""),
            ("MAPE (Hybrid)", self.mape, "%"),
        ];
        for (label, metric, unit) in rows {
            match (metric.hybrid, metric.delta) {
                (Some(value), Some(delta)) => {
                    writeln!(f, "{label:<15}{value:>12.2}{unit} ({delta:+.2} vs Prophet)")?
                }
                (Some(value), None) => writeln!(f, "{label:<15}{value:>12.2}{unit}")?,
                (None, _) => writeln!(f, "{label:<15}{:>12}", "n/a")?,
            }
        }
        Ok(())
    }
}

/// Forecast horizon in weeks, between 4 and 24
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Horizon(usize);

impl Horizon {
    pub const MIN: usize = 4;
    pub const MAX: usize = 24;
    pub const DEFAULT: usize = 12;

    pub fn new(weeks: usize) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&weeks) {
            return Err(ForecastError::InvalidParameter(format!(
                "Horizon must be between {} and {} weeks, got {weeks}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(weeks))
    }

    pub fn weeks(self) -> usize {
        self.0
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Result of an on-demand forecast request
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Ready(Vec<ForecastRecord>),
    /// Inference ran but returned nothing
    Empty,
}

/// Run inference for the dashboard; an empty result is a warning, not an error
pub fn request_forecast(config: &HybridConfig, key: GroupKey, horizon: Horizon) -> Result<ForecastOutcome> {
    let records = forecast_future(config, key, horizon.weeks())?;
    if records.is_empty() {
        warn!(store = key.store, dept = key.dept, "forecast returned no rows");
        return Ok(ForecastOutcome::Empty);
    }
    Ok(ForecastOutcome::Ready(records))
}

/// Write `metrics_{group}.csv` into `dir`, rounded to 3 dp
pub fn export_metrics(dir: &Path, record: &MetricsRecord) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("metrics_{}.csv", record.key()));
    let rounded = MetricsRecord {
        mae_prophet: round3(record.mae_prophet),
        rmse_prophet: round3(record.rmse_prophet),
        mape_prophet: record.mape_prophet.map(round3),
        mae_hybrid: round3(record.mae_hybrid),
        rmse_hybrid: round3(record.rmse_hybrid),
        mape_hybrid: record.mape_hybrid.map(round3),
        ..record.clone()
    };
    write_csv(&path, &[rounded])?;
    Ok(path)
}

/// Write `forecast_{group}.csv` into `dir`, rounded to 3 dp
pub fn export_forecast(dir: &Path, key: GroupKey, records: &[ForecastRecord]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("forecast_{key}.csv"));
    let rounded: Vec<ForecastRecord> = records
        .iter()
        .map(|r| ForecastRecord {
            weekly_sales: r.weekly_sales.map(round3),
            yhat: round3(r.yhat),
            trend: round3(r.trend),
            weekly: round3(r.weekly),
            yearly: round3(r.yearly),
            residual_pred: round3(r.residual_pred),
            yhat_hybrid: round3(r.yhat_hybrid),
            ..r.clone()
        })
        .collect();
    write_csv(&path, &rounded)?;
    Ok(path)
}
