//! Accuracy metrics for held-out forecasts

use crate::data::GroupKey;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;

/// Mean absolute error; NaN for empty or mismatched inputs
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .collect::<Vec<f64>>()
        .mean()
}

/// Root mean squared error; NaN for empty or mismatched inputs
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .collect::<Vec<f64>>()
        .mean()
        .sqrt()
}

/// MAPE in percent over rows whose actual value is non-zero.
///
/// `None` when no such row exists.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.len() != predicted.len() {
        return None;
    }
    let ratios: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    if ratios.is_empty() {
        None
    } else {
        Some(ratios.mean() * 100.0)
    }
}

/// Forecast accuracy on one test period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent; `None` when every actual is zero
    pub mape: Option<f64>,
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAE: {:.2}, RMSE: {:.2}, MAPE: ", self.mae, self.rmse)?;
        match self.mape {
            Some(mape) => write!(f, "{mape:.2}%"),
            None => write!(f, "n/a"),
        }
    }
}

/// Evaluate a forecast against actual values
pub fn evaluate_forecast(actual: &[f64], predicted: &[f64]) -> Result<ForecastMetrics> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(ForecastMetrics {
        mae: mean_absolute_error(actual, predicted),
        rmse: root_mean_squared_error(actual, predicted),
        mape: mean_absolute_percentage_error(actual, predicted),
    })
}

/// One row of `metrics.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    #[serde(rename = "Store")]
    pub store: u32,
    #[serde(rename = "Dept")]
    pub dept: u32,
    pub mae_prophet: f64,
    pub rmse_prophet: f64,
    pub mape_prophet: Option<f64>,
    pub mae_hybrid: f64,
    pub rmse_hybrid: f64,
    pub mape_hybrid: Option<f64>,
}

impl MetricsRecord {
    /// Header of `metrics.csv`, in serialization order
    pub const COLUMNS: [&'static str; 8] = [
        "Store",
        "Dept",
        "mae_prophet",
        "rmse_prophet",
        "mape_prophet",
        "mae_hybrid",
        "rmse_hybrid",
        "mape_hybrid",
    ];

    pub fn new(key: GroupKey, seasonal: &ForecastMetrics, hybrid: &ForecastMetrics) -> Self {
        Self {
            store: key.store,
            dept: key.dept,
            mae_prophet: seasonal.mae,
            rmse_prophet: seasonal.rmse,
            mape_prophet: seasonal.mape,
            mae_hybrid: hybrid.mae,
            rmse_hybrid: hybrid.rmse,
            mape_hybrid: hybrid.mape,
        }
    }

    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.store, self.dept)
    }

    /// Baseline minus hybrid; positive means the hybrid improved
    pub fn mae_delta(&self) -> f64 {
        self.mae_prophet - self.mae_hybrid
    }

    pub fn rmse_delta(&self) -> f64 {
        self.rmse_prophet - self.rmse_hybrid
    }

    pub fn mape_delta(&self) -> Option<f64> {
        Some(self.mape_prophet? - self.mape_hybrid?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_regression_metrics() {
        let actual = [10.0, 20.0, 30.0, 40.0, 50.0];
        let predicted = [12.0, 18.0, 33.0, 37.0, 52.0];

        assert_relative_eq!(mean_absolute_error(&actual, &predicted), 2.4, epsilon = 1e-12);
        assert_relative_eq!(root_mean_squared_error(&actual, &predicted), 2.4494897, epsilon = 1e-6);
        let mape = mean_absolute_percentage_error(&actual, &predicted).unwrap();
        assert_relative_eq!(mape, 10.3, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_actuals_skipped() {
        let actual = [0.0, 100.0];
        let predicted = [5.0, 90.0];
        assert_relative_eq!(
            mean_absolute_percentage_error(&actual, &predicted).unwrap(),
            10.0,
            epsilon = 1e-12
        );
        assert_eq!(mean_absolute_percentage_error(&[0.0, 0.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_error_handling() {
        let empty: [f64; 0] = [];
        assert!(mean_absolute_error(&empty, &empty).is_nan());
        assert!(root_mean_squared_error(&[1.0], &[1.0, 2.0]).is_nan());
        assert!(evaluate_forecast(&empty, &empty).is_err());
    }

    #[test]
    fn test_deltas() {
        let record = MetricsRecord {
            store: 1,
            dept: 2,
            mae_prophet: 10.0,
            rmse_prophet: 12.0,
            mape_prophet: Some(5.0),
            mae_hybrid: 7.5,
            rmse_hybrid: 13.0,
            mape_hybrid: None,
        };
        assert_eq!(record.key(), GroupKey::new(1, 2));
        assert_eq!(record.mae_delta(), 2.5);
        assert_eq!(record.rmse_delta(), -1.0);
        assert_eq!(record.mape_delta(), None);
    }

    #[test]
    fn test_columns_match_serialized_header() {
        let record = MetricsRecord::new(
            GroupKey::new(1, 1),
            &ForecastMetrics { mae: 1.0, rmse: 1.0, mape: None },
            &ForecastMetrics { mae: 1.0, rmse: 1.0, mape: None },
        );
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().next().unwrap(), MetricsRecord::COLUMNS.join(","));
    }
}
