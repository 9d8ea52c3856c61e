//! Pipeline configuration
//!
//! One `HybridConfig` value is built at startup (defaults, optionally a TOML
//! file, then environment overrides) and passed by reference into every
//! loader, trainer and inference call.

use crate::data::GroupKey;
use crate::error::{ForecastError, Result};
use chrono::{NaiveDate, Weekday};
use forecast_math::seasonal::{
    AdditiveModelParams, SeasonalityTerm, DAILY_PERIOD_DAYS, WEEKLY_PERIOD_DAYS, YEARLY_PERIOD_DAYS,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub paths: PathsConfig,
    pub calendar: CalendarConfig,
    pub seasonal: SeasonalConfig,
    pub booster: BoosterConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// First date of the held-out test period (inclusive)
    pub test_start: NaiveDate,
    /// Weekday every observation falls on (`W-FRI` for the Walmart data)
    pub anchor_weekday: Weekday,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalConfig {
    pub yearly_seasonality: bool,
    pub weekly_seasonality: bool,
    pub daily_seasonality: bool,
    pub seasonality_mode: String,
    pub yearly_fourier_order: usize,
    pub weekly_fourier_order: usize,
    pub daily_fourier_order: usize,
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub holidays_prior_scale: f64,
}

/// Residual booster settings, mapped onto `gbdt::config::Config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterConfig {
    /// Number of trees (`iterations`)
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    pub max_depth: u32,
    /// Share of rows drawn per tree
    pub subsample: f64,
    /// Share of features considered per tree
    pub colsample_bytree: f64,
    pub min_leaf_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub lags: Vec<usize>,
    pub rolling_windows: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Stop after this many groups have been trained; 0 trains every group
    pub group_limit: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("outputs"),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            // keep 2012 as test by default
            test_start: NaiveDate::from_ymd_opt(2012, 1, 6).unwrap_or(NaiveDate::MIN),
            anchor_weekday: Weekday::Fri,
        }
    }
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            yearly_seasonality: true,
            weekly_seasonality: true,
            daily_seasonality: false,
            seasonality_mode: "additive".to_string(),
            yearly_fourier_order: 10,
            weekly_fourier_order: 3,
            daily_fourier_order: 4,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            holidays_prior_scale: 10.0,
        }
    }
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            n_estimators: 600,
            learning_rate: 0.05,
            max_depth: 6,
            subsample: 0.9,
            colsample_bytree: 0.9,
            min_leaf_size: 1,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lags: vec![1, 2, 4],
            rolling_windows: vec![4, 8, 12],
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self { group_limit: 10 }
    }
}

impl SeasonalConfig {
    /// Engine parameters; seasonality names are `yearly`, `weekly`, `daily`
    pub fn to_params(&self) -> AdditiveModelParams {
        let mut params = AdditiveModelParams {
            seasonalities: Vec::new(),
            n_changepoints: self.n_changepoints,
            changepoint_range: self.changepoint_range,
            changepoint_prior_scale: self.changepoint_prior_scale,
            seasonality_prior_scale: self.seasonality_prior_scale,
            regressor_prior_scale: self.holidays_prior_scale,
        };
        if self.yearly_seasonality {
            params = params.with_seasonality(SeasonalityTerm::new(
                "yearly",
                YEARLY_PERIOD_DAYS,
                self.yearly_fourier_order,
            ));
        }
        if self.weekly_seasonality {
            params = params.with_seasonality(SeasonalityTerm::new(
                "weekly",
                WEEKLY_PERIOD_DAYS,
                self.weekly_fourier_order,
            ));
        }
        if self.daily_seasonality {
            params = params.with_seasonality(SeasonalityTerm::new(
                "daily",
                DAILY_PERIOD_DAYS,
                self.daily_fourier_order,
            ));
        }
        params
    }
}

impl BoosterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 || self.max_depth == 0 || self.min_leaf_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "booster n_estimators, max_depth and min_leaf_size must be positive".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "booster learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (name, ratio) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "booster {name} must be in (0, 1], got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

impl HybridConfig {
    /// Load settings from a TOML file, apply environment overrides, validate
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ForecastError::ConfigError(format!(
                "{} not found; copy hybrid.example.toml and adjust it",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let mut config: HybridConfig = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides; used when no file is given
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// The file at `path` when given, otherwise defaults plus environment
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::from_env(),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("HYBRID_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("HYBRID_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Ok(date) = std::env::var("HYBRID_TEST_START") {
            self.calendar.test_start = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                ForecastError::ConfigError(format!("HYBRID_TEST_START '{date}': {e}"))
            })?;
        }
        if let Ok(limit) = std::env::var("HYBRID_GROUP_LIMIT") {
            self.training.group_limit = limit.parse().map_err(|e| {
                ForecastError::ConfigError(format!("HYBRID_GROUP_LIMIT '{limit}': {e}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.seasonal.seasonality_mode != "additive" {
            return Err(ForecastError::InvalidParameter(format!(
                "Only additive seasonality is supported, got '{}'",
                self.seasonal.seasonality_mode
            )));
        }
        if !(self.seasonal.changepoint_range > 0.0 && self.seasonal.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.seasonal.changepoint_range
            )));
        }
        self.booster.validate()?;
        if self.features.lags.is_empty() || self.features.lags.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "features.lags must be non-empty and positive".to_string(),
            ));
        }
        if self.features.rolling_windows.is_empty() || self.features.rolling_windows.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "features.rolling_windows must be non-empty and positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn models_dir(&self) -> PathBuf {
        self.paths.output_dir.join("models")
    }

    pub fn metrics_dir(&self) -> PathBuf {
        self.paths.output_dir.join("metrics")
    }

    pub fn forecasts_dir(&self) -> PathBuf {
        self.paths.output_dir.join("forecasts")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.metrics_dir().join("metrics.csv")
    }

    pub fn forecast_path(&self, key: GroupKey) -> PathBuf {
        self.forecasts_dir().join(format!("preds_{key}.csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_reference_settings() {
        let config = HybridConfig::default();
        assert_eq!(config.calendar.test_start, NaiveDate::from_ymd_opt(2012, 1, 6).unwrap());
        assert_eq!(config.calendar.anchor_weekday, Weekday::Fri);
        assert_eq!(config.booster.n_estimators, 600);
        assert_eq!(config.features.lags, vec![1, 2, 4]);
        assert_eq!(config.training.group_limit, 10);
        assert!(config.validate().is_ok());

        let params = config.seasonal.to_params();
        let names: Vec<&str> = params.seasonalities.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["yearly", "weekly"]);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[paths]").unwrap();
        writeln!(file, "output_dir = \"out\"").unwrap();
        writeln!(file, "[booster]").unwrap();
        writeln!(file, "n_estimators = 50").unwrap();

        let config = HybridConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.paths.output_dir, PathBuf::from("out"));
        assert_eq!(config.paths.data_dir, PathBuf::from("data"));
        assert_eq!(config.booster.n_estimators, 50);
        assert_eq!(config.booster.max_depth, 6);
        assert_eq!(config.models_dir(), PathBuf::from("out").join("models"));
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../hybrid.example.toml");
        let content = fs::read_to_string(path).unwrap();
        let config: HybridConfig = toml::from_str(&content).unwrap();
        assert_eq!(config, HybridConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = HybridConfig::default();
        config.booster.subsample = 1.5;
        assert!(config.validate().is_err());

        let mut config = HybridConfig::default();
        config.booster.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = HybridConfig::default();
        config.seasonal.seasonality_mode = "multiplicative".to_string();
        assert!(config.validate().is_err());

        let mut config = HybridConfig::default();
        config.features.rolling_windows = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = HybridConfig::load_from_file("does/not/exist.toml").unwrap_err();
        assert!(matches!(err, ForecastError::ConfigError(_)));
    }

    #[test]
    fn test_artifact_paths() {
        let config = HybridConfig::default();
        let key = GroupKey::new(3, 14);
        assert_eq!(
            config.forecast_path(key),
            PathBuf::from("outputs/forecasts/preds_3_14.csv")
        );
        assert_eq!(
            config.metrics_path(),
            PathBuf::from("outputs/metrics/metrics.csv")
        );
    }
}
