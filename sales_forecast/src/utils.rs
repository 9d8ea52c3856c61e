//! Utility functions for the sales_forecast crate

use crate::config::HybridConfig;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Initialise tracing for the binaries; `RUST_LOG` overrides the `info` default
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ForecastError::ConfigError(format!("Failed to set tracing subscriber: {e}")))
}

/// Progress bar for a loop over `len` groups
pub fn group_progress(len: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Create the models, metrics and forecasts directories
pub fn ensure_dirs(config: &HybridConfig) -> Result<()> {
    for dir in [config.models_dir(), config.metrics_dir(), config.forecasts_dir()] {
        fs::create_dir_all(&dir)?;
    }
    Ok(())
}

/// `horizon` dates on `anchor`, every 7 days, the first strictly after `last`
pub fn future_weekly_dates(last: NaiveDate, anchor: Weekday, horizon: usize) -> Vec<NaiveDate> {
    let mut first = last + Duration::days(1);
    while first.weekday() != anchor {
        first += Duration::days(1);
    }
    (0..horizon)
        .map(|i| first + Duration::weeks(i as i64))
        .collect()
}

/// Round to 3 decimal places for exported tables
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Like [`write_csv`], but an empty table still gets its header row
pub fn write_table<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    if !rows.is_empty() {
        return write_csv(path, rows);
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    writer.flush()?;
    Ok(())
}

/// Read a table this crate wrote; absent files are `MissingArtifact`
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(ForecastError::missing(path));
    }
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}
