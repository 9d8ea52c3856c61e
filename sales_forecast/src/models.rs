//! Per-group forecasting models

use crate::data::GroupKey;
use crate::error::{ForecastError, Result};
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// An unfitted model: hyperparameters only
pub trait ForecastModel: Debug + Clone {
    /// Row type the model consumes
    type Input;
    /// The fitted model produced by [`ForecastModel::fit`]
    type Trained: TrainedModel<Input = Self::Input>;

    /// Fit on `rows` against `targets`, one target per row
    fn fit(&self, rows: &[Self::Input], targets: &[f64]) -> Result<Self::Trained>;

    fn name(&self) -> &str;
}

/// A fitted model that can predict and round-trip through disk
pub trait TrainedModel: Debug + Sized {
    type Input;
    type Output;

    /// File name prefix of the per-group artifact
    const ARTIFACT_PREFIX: &'static str;

    fn predict(&self, rows: &[Self::Input]) -> Result<Vec<Self::Output>>;

    /// Write the model to `path`, replacing any existing file
    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>;

    fn name(&self) -> &str;

    /// `{models_dir}/{prefix}_{store}_{dept}.json`
    fn artifact_path(models_dir: &Path, key: GroupKey) -> PathBuf {
        models_dir.join(format!("{}_{}.json", Self::ARTIFACT_PREFIX, key))
    }

    fn save_for_group(&self, models_dir: &Path, key: GroupKey) -> Result<PathBuf> {
        let path = Self::artifact_path(models_dir, key);
        self.save(&path)?;
        Ok(path)
    }

    /// Load the group's artifact, failing with `MissingArtifact` if absent
    fn load_for_group(models_dir: &Path, key: GroupKey) -> Result<Self> {
        let path = Self::artifact_path(models_dir, key);
        if !path.exists() {
            return Err(ForecastError::missing(path));
        }
        Self::load(&path)
    }
}

pub mod residual;
pub mod seasonal;

pub use residual::{ResidualModel, TrainedResidualModel};
pub use seasonal::{SeasonalForecast, SeasonalInput, SeasonalModel, TrainedSeasonalModel};
