//! Calendar and autoregressive features for the residual model

use crate::config::FeatureConfig;
use crate::data::{Exogenous, ExogenousColumn, GroupKey, Observation};
use crate::error::Result;
use chrono::{Datelike, NaiveDate};
use forecast_math::rolling::{lagged, shifted_rolling_mean};
use serde::{Deserialize, Serialize};

/// Deterministic functions of the date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    /// ISO week, 1 to 53
    pub week_of_year: u32,
    pub month: u32,
    pub year: i32,
    /// Monday = 0
    pub day_of_week: u32,
}

impl CalendarFeatures {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            week_of_year: date.iso_week().week(),
            month: date.month(),
            year: date.year(),
            day_of_week: date.weekday().num_days_from_monday(),
        }
    }
}

/// An observation plus the engineered features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub key: GroupKey,
    pub date: NaiveDate,
    /// Weekly sales; `None` for rows that have not happened yet
    pub target: Option<f64>,
    pub is_holiday: u8,
    pub exogenous: Exogenous,
    pub calendar: CalendarFeatures,
    /// Aligned with [`FeatureLayout::lags`]
    pub lags: Vec<Option<f64>>,
    /// Aligned with [`FeatureLayout::rolling_windows`]
    pub rolling_means: Vec<Option<f64>>,
}

impl FeatureRow {
    /// A row with calendar features only
    pub fn from_observation(obs: &Observation) -> Self {
        Self {
            key: obs.key(),
            date: obs.date,
            target: Some(obs.weekly_sales),
            is_holiday: obs.is_holiday,
            exogenous: obs.exogenous,
            calendar: CalendarFeatures::from_date(obs.date),
            lags: Vec::new(),
            rolling_means: Vec::new(),
        }
    }
}

/// Ordered columns of the residual model's feature vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureLayout {
    lags: Vec<usize>,
    rolling_windows: Vec<usize>,
}

impl FeatureLayout {
    pub fn new(lags: Vec<usize>, rolling_windows: Vec<usize>) -> Self {
        Self {
            lags,
            rolling_windows,
        }
    }

    pub fn from_config(config: &FeatureConfig) -> Self {
        Self::new(config.lags.clone(), config.rolling_windows.clone())
    }

    pub fn lags(&self) -> &[usize] {
        &self.lags
    }

    pub fn rolling_windows(&self) -> &[usize] {
        &self.rolling_windows
    }

    /// `IsHoliday`, exogenous signals, calendar, `lag_*`, `rollmean_*`
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec!["IsHoliday".to_string()];
        names.extend(ExogenousColumn::ALL.iter().map(|c| c.name().to_string()));
        names.extend(["weekofyear", "month", "dow"].map(String::from));
        names.extend(self.lags.iter().map(|l| format!("lag_{l}")));
        names.extend(self.rolling_windows.iter().map(|w| format!("rollmean_{w}")));
        names
    }

    pub fn width(&self) -> usize {
        1 + ExogenousColumn::ALL.len() + 3 + self.lags.len() + self.rolling_windows.len()
    }

    /// Feature vector with NaN for missing values
    pub fn vectorize(&self, row: &FeatureRow) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.width());
        values.push(f64::from(row.is_holiday));
        values.extend(
            ExogenousColumn::ALL
                .iter()
                .map(|c| c.get(&row.exogenous).unwrap_or(f64::NAN)),
        );
        values.push(f64::from(row.calendar.week_of_year));
        values.push(f64::from(row.calendar.month));
        values.push(f64::from(row.calendar.day_of_week));
        for i in 0..self.lags.len() {
            values.push(row.lags.get(i).copied().flatten().unwrap_or(f64::NAN));
        }
        for i in 0..self.rolling_windows.len() {
            values.push(row.rolling_means.get(i).copied().flatten().unwrap_or(f64::NAN));
        }
        values
    }
}

/// Calendar features for every row, input order preserved
pub fn add_time_features(rows: &[Observation]) -> Vec<FeatureRow> {
    rows.iter().map(FeatureRow::from_observation).collect()
}

/// Fill lag and shifted rolling-mean columns within each group.
///
/// Output is sorted by (Store, Dept, Date) whatever the input order.
pub fn make_lags(mut rows: Vec<FeatureRow>, layout: &FeatureLayout) -> Result<Vec<FeatureRow>> {
    rows.sort_by(|a, b| (a.key, a.date).cmp(&(b.key, b.date)));

    let mut start = 0;
    while start < rows.len() {
        let key = rows[start].key;
        let end = start + rows[start..].iter().take_while(|r| r.key == key).count();
        let group = &mut rows[start..end];

        let targets: Vec<f64> = group.iter().map(|r| r.target.unwrap_or(f64::NAN)).collect();
        let lag_columns = layout
            .lags
            .iter()
            .map(|&lag| lagged(&targets, lag))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let rolling_columns = layout
            .rolling_windows
            .iter()
            .map(|&window| shifted_rolling_mean(&targets, window))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for (i, row) in group.iter_mut().enumerate() {
            row.lags = lag_columns.iter().map(|c| c[i]).collect();
            row.rolling_means = rolling_columns.iter().map(|c| c[i]).collect();
        }
        start = end;
    }

    Ok(rows)
}

/// Calendar plus autoregressive features in one pass
pub fn build_feature_frame(rows: &[Observation], layout: &FeatureLayout) -> Result<Vec<FeatureRow>> {
    make_lags(add_time_features(rows), layout)
}
