//! Blended forecast rows

use crate::data::GroupKey;
use crate::error::{ForecastError, Result};
use crate::models::SeasonalForecast;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of a `preds_*.csv` table or an inference result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    #[serde(rename = "Store")]
    pub store: u32,
    #[serde(rename = "Dept")]
    pub dept: u32,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    /// Actual sales when known
    #[serde(rename = "Weekly_Sales")]
    pub weekly_sales: Option<f64>,
    pub yhat: f64,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
    pub residual_pred: f64,
    pub yhat_hybrid: f64,
}

impl ForecastRecord {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.store, self.dept)
    }
}

/// Add predicted residuals to the baseline, row by row.
///
/// `actuals` is either empty (future rows) or aligned with `baseline`.
pub fn blend(
    key: GroupKey,
    baseline: &[SeasonalForecast],
    residuals: &[f64],
    actuals: &[f64],
) -> Result<Vec<ForecastRecord>> {
    if baseline.len() != residuals.len() || !(actuals.is_empty() || actuals.len() == baseline.len()) {
        return Err(ForecastError::ModelError(format!(
            "Cannot blend {} baseline rows with {} residuals and {} actuals",
            baseline.len(),
            residuals.len(),
            actuals.len()
        )));
    }

    Ok(baseline
        .iter()
        .zip(residuals)
        .enumerate()
        .map(|(i, (base, &residual))| ForecastRecord {
            store: key.store,
            dept: key.dept,
            date: base.date,
            weekly_sales: actuals.get(i).copied(),
            yhat: base.yhat,
            trend: base.trend,
            weekly: base.weekly,
            yearly: base.yearly,
            residual_pred: residual,
            yhat_hybrid: base.yhat + residual,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(day: u32, yhat: f64) -> SeasonalForecast {
        SeasonalForecast {
            date: NaiveDate::from_ymd_opt(2012, 1, day).unwrap(),
            yhat,
            trend: yhat,
            weekly: 0.0,
            yearly: 0.0,
        }
    }

    #[test]
    fn test_blend_adds_residual() {
        let rows = blend(
            GroupKey::new(1, 1),
            &[base(6, 100.0), base(13, 110.0)],
            &[5.5, -2.25],
            &[],
        )
        .unwrap();
        assert_eq!(rows[0].yhat_hybrid, 105.5);
        assert_eq!(rows[1].yhat_hybrid, 107.75);
        assert!(rows.iter().all(|r| r.weekly_sales.is_none()));
    }

    #[test]
    fn test_blend_length_mismatch() {
        let result = blend(GroupKey::new(1, 1), &[base(6, 1.0)], &[], &[]);
        assert!(result.is_err());
    }
}
