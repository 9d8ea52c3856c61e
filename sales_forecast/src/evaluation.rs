//! Averages over the consolidated metrics table

use crate::config::HybridConfig;
use crate::error::{ForecastError, Result};
use crate::utils::round3;
use polars::prelude::*;
use std::fmt;
use std::fs::File;
use std::path::Path;

pub const METRIC_COLUMNS: [&str; 6] = [
    "mae_prophet",
    "rmse_prophet",
    "mape_prophet",
    "mae_hybrid",
    "rmse_hybrid",
    "mape_hybrid",
];

/// Mean of every metric column across trained groups
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub groups: usize,
    /// `(column, mean)` in [`METRIC_COLUMNS`] order; `None` when a column is all null
    pub means: Vec<(String, Option<f64>)>,
}

impl MetricsSummary {
    pub fn mean(&self, column: &str) -> Option<f64> {
        self.means
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| *value)
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Average metrics across {} trained groups:", self.groups)?;
        for (name, value) in &self.means {
            match value {
                Some(v) => writeln!(f, "{name:<14}{v:>14.3}")?,
                None => writeln!(f, "{name:<14}{:>14}", "n/a")?,
            }
        }
        Ok(())
    }
}

/// Column means of a metrics table, nulls ignored, rounded to 3 dp
pub fn summarize_metrics<P: AsRef<Path>>(path: P) -> Result<MetricsSummary> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ForecastError::missing(path));
    }
    if csv::Reader::from_path(path)?.records().next().is_none() {
        return Err(ForecastError::DataError(format!(
            "{}: no trained groups; hybrid_train needs groups with rows on both sides of calendar.test_start",
            path.display()
        )));
    }

    let df = CsvReader::new(File::open(path)?)
        .infer_schema(None)
        .has_header(true)
        .finish()?;
    let groups = df.height();

    let averaged = df
        .lazy()
        .select(
            METRIC_COLUMNS
                .iter()
                .map(|c| col(c).cast(DataType::Float64).mean())
                .collect::<Vec<_>>(),
        )
        .collect()?;

    let mut means = Vec::with_capacity(METRIC_COLUMNS.len());
    for name in METRIC_COLUMNS {
        let value = averaged.column(name)?.f64()?.get(0).map(round3);
        means.push((name.to_string(), value));
    }

    Ok(MetricsSummary { groups, means })
}

/// Summarise `metrics.csv` under the configured output directory
pub fn evaluate(config: &HybridConfig) -> Result<MetricsSummary> {
    summarize_metrics(config.metrics_path())
}
