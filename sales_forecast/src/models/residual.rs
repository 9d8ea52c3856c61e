//! Gradient-boosted correction of the seasonal baseline's error
//!
//! The trees are a `gbdt` regressor persisted in the library's own format
//! (`xgb_{store}_{dept}.json`). Next to it sits a small feature manifest
//! (`xgb_{store}_{dept}.features.json`) naming the ordered input columns, so a
//! model is never fed vectors built for a different layout.

use crate::config::{BoosterConfig, HybridConfig};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureLayout, FeatureRow};
use crate::models::{ForecastModel, TrainedModel};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec, ValueType, VALUE_TYPE_UNKNOWN};
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ARTIFACT_FORMAT: &str = "gbdt-rs";
pub const ARTIFACT_VERSION: u32 = 2;

const LOSS: &str = "SquaredError";

/// Feature row in the booster's input encoding; NaN becomes the unknown marker
fn encode(layout: &FeatureLayout, row: &FeatureRow) -> Vec<ValueType> {
    layout
        .vectorize(row)
        .into_iter()
        .map(|v| if v.is_nan() { VALUE_TYPE_UNKNOWN } else { v as ValueType })
        .collect()
}

/// Manifest path stored next to the booster file
pub fn manifest_path(path: &Path) -> PathBuf {
    path.with_extension("features.json")
}

fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        ForecastError::SerializationError(format!("{}: path is not valid UTF-8", path.display()))
    })
}

#[derive(Debug, Clone)]
pub struct ResidualModel {
    layout: FeatureLayout,
    params: BoosterConfig,
}

impl ResidualModel {
    pub fn new(layout: FeatureLayout, params: BoosterConfig) -> Self {
        Self { layout, params }
    }

    pub fn from_config(config: &HybridConfig) -> Self {
        Self::new(FeatureLayout::from_config(&config.features), config.booster.clone())
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    fn gbdt_config(&self, n_rows: usize) -> Config {
        let mut cfg = Config::new();
        cfg.set_feature_size(self.layout.width());
        cfg.set_max_depth(self.params.max_depth);
        cfg.set_iterations(self.params.n_estimators);
        cfg.set_shrinkage(self.params.learning_rate as ValueType);
        cfg.set_min_leaf_size(self.params.min_leaf_size);
        cfg.set_loss(LOSS);
        // a sample ratio that rounds to zero rows would grow empty trees
        let subsample = if (n_rows as f64 * self.params.subsample) < 1.0 {
            1.0
        } else {
            self.params.subsample
        };
        cfg.set_data_sample_ratio(subsample);
        cfg.set_feature_sample_ratio(self.params.colsample_bytree);
        cfg
    }
}

impl ForecastModel for ResidualModel {
    type Input = FeatureRow;
    type Trained = TrainedResidualModel;

    fn fit(&self, rows: &[FeatureRow], targets: &[f64]) -> Result<TrainedResidualModel> {
        if rows.is_empty() {
            return Err(ForecastError::DataError(
                "Cannot fit the residual model on zero rows".to_string(),
            ));
        }
        if rows.len() != targets.len() {
            return Err(ForecastError::DataError(format!(
                "{} feature rows but {} residual targets",
                rows.len(),
                targets.len()
            )));
        }
        if let Some(bad) = targets.iter().find(|t| !t.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Residual target {bad} is not finite"
            )));
        }
        self.params.validate()?;

        let mut data: DataVec = rows
            .iter()
            .zip(targets)
            .map(|(row, &y)| Data::new_training_data(encode(&self.layout, row), 1.0, y as ValueType, None))
            .collect();

        let mut booster = GBDT::new(&self.gbdt_config(rows.len()));
        booster.fit(&mut data);
        debug!(
            rows = rows.len(),
            features = self.layout.width(),
            trees = self.params.n_estimators,
            "fitted residual model"
        );
        Ok(TrainedResidualModel {
            layout: self.layout.clone(),
            booster,
        })
    }

    fn name(&self) -> &str {
        "Residual booster"
    }
}

pub struct TrainedResidualModel {
    layout: FeatureLayout,
    booster: GBDT,
}

impl fmt::Debug for TrainedResidualModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainedResidualModel")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize)]
struct FeatureManifest {
    format: String,
    version: u32,
    feature_names: Vec<String>,
    layout: FeatureLayout,
}

impl TrainedResidualModel {
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.layout.column_names()
    }

    /// Fails if the model was trained on a different feature layout
    pub fn ensure_layout(&self, layout: &FeatureLayout) -> Result<()> {
        if &self.layout != layout {
            return Err(ForecastError::DataError(format!(
                "Residual model expects features {:?}, configuration produces {:?}; retrain with hybrid_train",
                self.layout.column_names(),
                layout.column_names()
            )));
        }
        Ok(())
    }
}

/// Rejects boosters whose shape would make `GBDT::predict` panic
fn check_booster(path: &Path, booster: &GBDT, width: usize) -> Result<()> {
    let value = serde_json::to_value(booster)?;
    let feature_size = value["conf"]["feature_size"].as_u64();
    let iterations = value["conf"]["iterations"].as_u64();
    let trees = value["trees"].as_array().map(|t| t.len() as u64);
    let loss = value["conf"]["loss"].as_str();

    if feature_size != Some(width as u64) || iterations.is_none() || trees != iterations || loss != Some(LOSS) {
        return Err(ForecastError::SerializationError(format!(
            "{}: booster has feature_size {:?}, {:?} of {:?} trees, loss {:?}; expected {} features and {}",
            path.display(),
            feature_size,
            trees,
            iterations,
            loss,
            width,
            LOSS
        )));
    }
    Ok(())
}

impl TrainedModel for TrainedResidualModel {
    type Input = FeatureRow;
    type Output = f64;

    const ARTIFACT_PREFIX: &'static str = "xgb";

    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        let data: DataVec = rows
            .iter()
            .map(|r| Data::new_test_data(encode(&self.layout, r), None))
            .collect();
        Ok(self.booster.predict(&data).into_iter().map(f64::from).collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.booster
            .save_model(utf8_path(path)?)
            .map_err(|e| ForecastError::SerializationError(format!("{}: {e}", path.display())))?;

        let manifest = FeatureManifest {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            feature_names: self.feature_names(),
            layout: self.layout.clone(),
        };
        let mut writer = BufWriter::new(File::create(manifest_path(path))?);
        serde_json::to_writer_pretty(&mut writer, &manifest)?;
        writer.flush()?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let manifest_file = manifest_path(path);
        for required in [path, manifest_file.as_path()] {
            if !required.exists() {
                return Err(ForecastError::missing(required));
            }
        }

        let manifest: FeatureManifest =
            serde_json::from_reader(BufReader::new(File::open(&manifest_file)?))?;
        if manifest.format != ARTIFACT_FORMAT || manifest.version != ARTIFACT_VERSION {
            return Err(ForecastError::SerializationError(format!(
                "{}: unsupported residual artifact {} v{}",
                manifest_file.display(),
                manifest.format,
                manifest.version
            )));
        }
        let expected = manifest.layout.column_names();
        if manifest.feature_names != expected {
            return Err(ForecastError::SerializationError(format!(
                "{}: feature names {:?} do not match layout {:?}",
                manifest_file.display(),
                manifest.feature_names,
                expected
            )));
        }

        let booster = GBDT::load_model(utf8_path(path)?)
            .map_err(|e| ForecastError::SerializationError(format!("{}: {e}", path.display())))?;
        check_booster(path, &booster, expected.len())?;

        Ok(Self {
            layout: manifest.layout,
            booster,
        })
    }

    fn name(&self) -> &str {
        "Residual booster"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Exogenous, GroupKey, Observation};
    use crate::features::build_feature_frame;
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    fn small_model() -> (TrainedResidualModel, Vec<FeatureRow>) {
        let start = NaiveDate::from_ymd_opt(2010, 2, 5).unwrap();
        let observations: Vec<Observation> = (0..40)
            .map(|i| Observation {
                store: 1,
                dept: 1,
                date: start + Duration::weeks(i),
                weekly_sales: 100.0 + (i % 5) as f64,
                is_holiday: 0,
                exogenous: Exogenous {
                    fuel_price: Some(2.5 + (i % 3) as f64 * 0.5),
                    ..Exogenous::default()
                },
                store_type: None,
            })
            .collect();
        let layout = FeatureLayout::new(vec![1, 2], vec![4]);
        let rows = build_feature_frame(&observations, &layout).unwrap();
        let targets: Vec<f64> = rows
            .iter()
            .map(|r| r.exogenous.fuel_price.unwrap() * 10.0)
            .collect();
        let params = BoosterConfig {
            n_estimators: 30,
            max_depth: 3,
            ..BoosterConfig::default()
        };
        let model = ResidualModel::new(layout, params).fit(&rows, &targets).unwrap();
        (model, rows)
    }

    #[test]
    fn test_learns_exogenous_signal() {
        let (model, rows) = small_model();
        let preds = model.predict(&rows).unwrap();
        let mae: f64 = rows
            .iter()
            .zip(&preds)
            .map(|(r, p)| (r.exogenous.fuel_price.unwrap() * 10.0 - p).abs())
            .sum::<f64>()
            / rows.len() as f64;
        // targets span 25..35; a constant predictor is off by ~3.3 on average
        assert!(mae < 2.0, "mae {mae}");
    }

    #[test]
    fn test_missing_values_use_unknown_marker() {
        let (_, rows) = small_model();
        let layout = FeatureLayout::new(vec![1, 2], vec![4]);
        let encoded = encode(&layout, &rows[0]);
        // Temperature is absent in the fixture
        assert_eq!(encoded[1], VALUE_TYPE_UNKNOWN);
        assert!(encoded.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_round_trip_keeps_predictions() {
        let (model, rows) = small_model();
        let dir = tempdir().unwrap();
        let path = model.save_for_group(dir.path(), GroupKey::new(4, 9)).unwrap();
        assert!(path.ends_with("xgb_4_9.json"));
        assert!(dir.path().join("xgb_4_9.features.json").exists());

        let loaded = TrainedResidualModel::load_for_group(dir.path(), GroupKey::new(4, 9)).unwrap();
        assert_eq!(loaded.feature_names(), model.feature_names());
        assert_eq!(loaded.predict(&rows).unwrap(), model.predict(&rows).unwrap());
    }

    #[test]
    fn test_tampered_feature_names_rejected() {
        let (model, _) = small_model();
        let dir = tempdir().unwrap();
        let path = dir.path().join("xgb_1_1.json");
        model.save(&path).unwrap();

        let manifest = manifest_path(&path);
        let text = std::fs::read_to_string(&manifest).unwrap();
        std::fs::write(&manifest, text.replace("\"lag_2\"", "\"lag_3\"")).unwrap();

        let err = TrainedResidualModel::load(&path).unwrap_err();
        assert!(matches!(err, ForecastError::SerializationError(_)));
    }

    #[test]
    fn test_booster_for_other_width_rejected() {
        let (model, _) = small_model();
        let dir = tempdir().unwrap();
        let path = dir.path().join("xgb_1_1.json");
        model.save(&path).unwrap();

        // manifest claims one more lag than the trees were grown on
        let manifest = FeatureManifest {
            format: ARTIFACT_FORMAT.to_string(),
            version: ARTIFACT_VERSION,
            feature_names: FeatureLayout::new(vec![1, 2, 3], vec![4]).column_names(),
            layout: FeatureLayout::new(vec![1, 2, 3], vec![4]),
        };
        std::fs::write(manifest_path(&path), serde_json::to_string(&manifest).unwrap()).unwrap();

        let err = TrainedResidualModel::load(&path).unwrap_err();
        assert!(matches!(err, ForecastError::SerializationError(_)));
    }

    #[test]
    fn test_missing_manifest_is_missing_artifact() {
        let (model, _) = small_model();
        let dir = tempdir().unwrap();
        let path = dir.path().join("xgb_1_1.json");
        model.save(&path).unwrap();
        std::fs::remove_file(manifest_path(&path)).unwrap();

        assert!(TrainedResidualModel::load(&path).unwrap_err().is_missing_artifact());
    }

    #[test]
    fn test_zero_rows_rejected() {
        let spec = ResidualModel::new(FeatureLayout::new(vec![1], vec![4]), BoosterConfig::default());
        assert!(matches!(spec.fit(&[], &[]), Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_layout_mismatch_detected() {
        let (model, _) = small_model();
        assert!(model.ensure_layout(&FeatureLayout::new(vec![1, 2], vec![4])).is_ok());
        assert!(model.ensure_layout(&FeatureLayout::new(vec![1], vec![4])).is_err());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempdir().unwrap();
        let err = TrainedResidualModel::load_for_group(dir.path(), GroupKey::new(1, 1)).unwrap_err();
        assert!(err.is_missing_artifact());
    }
}
