//! Error types for the sales_forecast crate

use forecast_math::MathError;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Input tables are malformed, incomplete, or a group has no usable rows
    #[error("Data error: {0}")]
    DataError(String),

    /// A persisted model or output table does not exist yet
    #[error("Missing artifact: {path} (run hybrid_train first)")]
    MissingArtifact { path: PathBuf },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Numeric failure inside a model engine
    #[error("Model error: {0}")]
    ModelError(String),

    /// Config file could not be read or parsed
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error reading or writing CSV tables
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Error encoding or decoding model artifacts
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

impl ForecastError {
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        ForecastError::MissingArtifact { path: path.into() }
    }

    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, ForecastError::MissingArtifact { .. })
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        ForecastError::ModelError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::CsvError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
