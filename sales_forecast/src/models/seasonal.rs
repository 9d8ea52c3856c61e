//! Additive trend and seasonality baseline

use crate::config::SeasonalConfig;
use crate::data::Observation;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, TrainedModel};
use chrono::{Datelike, NaiveDate};
use forecast_math::seasonal::{AdditiveModel, AdditiveModelParams};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// What the baseline sees of a row: the date and the holiday flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonalInput {
    pub date: NaiveDate,
    pub is_holiday: u8,
}

impl From<&Observation> for SeasonalInput {
    fn from(obs: &Observation) -> Self {
        Self {
            date: obs.date,
            is_holiday: obs.is_holiday,
        }
    }
}

/// Baseline prediction with its decomposition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalForecast {
    pub date: NaiveDate,
    pub yhat: f64,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
}

#[derive(Debug, Clone)]
pub struct SeasonalModel {
    params: AdditiveModelParams,
}

impl SeasonalModel {
    pub fn new(params: AdditiveModelParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &SeasonalConfig) -> Self {
        Self::new(config.to_params())
    }
}

fn time_axis(inputs: &[SeasonalInput]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let days = inputs
        .iter()
        .map(|r| f64::from(r.date.num_days_from_ce()))
        .collect();
    let holidays = inputs.iter().map(|r| f64::from(r.is_holiday)).collect();
    (days, vec![holidays])
}

impl ForecastModel for SeasonalModel {
    type Input = SeasonalInput;
    type Trained = TrainedSeasonalModel;

    fn fit(&self, rows: &[SeasonalInput], targets: &[f64]) -> Result<TrainedSeasonalModel> {
        let (days, regressors) = time_axis(rows);
        let engine = AdditiveModel::fit(&self.params, &days, targets, &regressors)?;
        debug!(
            rows = rows.len(),
            changepoints = engine.changepoints().len(),
            "fitted seasonal model"
        );
        Ok(TrainedSeasonalModel { engine })
    }

    fn name(&self) -> &str {
        "Seasonal"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedSeasonalModel {
    engine: AdditiveModel,
}

impl TrainedSeasonalModel {
    pub fn engine(&self) -> &AdditiveModel {
        &self.engine
    }
}

impl TrainedModel for TrainedSeasonalModel {
    type Input = SeasonalInput;
    type Output = SeasonalForecast;

    const ARTIFACT_PREFIX: &'static str = "prophet";

    fn predict(&self, rows: &[SeasonalInput]) -> Result<Vec<SeasonalForecast>> {
        let (days, regressors) = time_axis(rows);
        let weekly = self.engine.seasonality_index("weekly");
        let yearly = self.engine.seasonality_index("yearly");
        let term = |seasonal: &[f64], index: Option<usize>| {
            index.and_then(|i| seasonal.get(i).copied()).unwrap_or(0.0)
        };

        Ok(self
            .engine
            .decompose(&days, &regressors)?
            .into_iter()
            .zip(rows)
            .map(|(c, row)| SeasonalForecast {
                date: row.date,
                yhat: c.yhat,
                trend: c.trend,
                weekly: term(c.seasonal.as_slice(), weekly),
                yearly: term(c.seasonal.as_slice(), yearly),
            })
            .collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForecastError::missing(path));
        }
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        model.engine.validate().map_err(|e| {
            ForecastError::SerializationError(format!("{}: {e}", path.display()))
        })?;
        Ok(model)
    }

    fn name(&self) -> &str {
        "Seasonal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HybridConfig;
    use approx::assert_relative_eq;
    use chrono::Duration;
    use tempfile::tempdir;

    fn weekly_inputs(n: usize) -> Vec<SeasonalInput> {
        let start = NaiveDate::from_ymd_opt(2010, 2, 5).unwrap();
        (0..n)
            .map(|i| SeasonalInput {
                date: start + Duration::weeks(i as i64),
                is_holiday: u8::from(i % 52 == 44),
            })
            .collect()
    }

    #[test]
    fn test_components_sum_to_yhat_without_holiday() {
        let inputs = weekly_inputs(104);
        let targets: Vec<f64> = (0..104)
            .map(|i| 1000.0 + 5.0 * i as f64 + 200.0 * (i as f64 * 0.12).sin())
            .collect();

        let spec = SeasonalModel::from_config(&HybridConfig::default().seasonal);
        let model = spec.fit(&inputs, &targets).unwrap();
        let future = vec![SeasonalInput {
            date: NaiveDate::from_ymd_opt(2012, 3, 2).unwrap(),
            is_holiday: 0,
        }];
        let fc = model.predict(&future).unwrap();

        assert_eq!(fc.len(), 1);
        assert_relative_eq!(fc[0].yhat, fc[0].trend + fc[0].weekly + fc[0].yearly, epsilon = 1e-6);
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let inputs = weekly_inputs(60);
        let targets: Vec<f64> = (0..60).map(|i| 500.0 + (i as f64).cos() * 50.0).collect();
        let model = SeasonalModel::from_config(&HybridConfig::default().seasonal)
            .fit(&inputs, &targets)
            .unwrap();

        let dir = tempdir().unwrap();
        let path = model
            .save_for_group(dir.path(), crate::data::GroupKey::new(1, 2))
            .unwrap();
        assert!(path.ends_with("prophet_1_2.json"));

        let loaded = TrainedSeasonalModel::load(&path).unwrap();
        let before = model.predict(&inputs).unwrap();
        let after = loaded.predict(&inputs).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_relative_eq!(a.yhat, b.yhat, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_load_rejects_coefficients_of_other_shape() {
        let inputs = weekly_inputs(60);
        let targets: Vec<f64> = (0..60).map(|i| 500.0 + i as f64).collect();
        let model = SeasonalModel::from_config(&HybridConfig::default().seasonal)
            .fit(&inputs, &targets)
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("prophet_1_1.json");
        model.save(&path).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        doc["engine"]["coefficients"] = serde_json::json!([1.0, 2.0]);
        std::fs::write(&path, doc.to_string()).unwrap();

        let err = TrainedSeasonalModel::load(&path).unwrap_err();
        assert!(matches!(err, ForecastError::SerializationError(_)));
    }
}
