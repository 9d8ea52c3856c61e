//! # Forecast Math
//!
//! Numeric building blocks for the hybrid sales forecaster.
//! This crate knows nothing about stores, departments or CSV files; it works on
//! plain ordered slices of `f64`.

use thiserror::Error;

pub mod linalg;
pub mod rolling;
pub mod seasonal;

/// Errors that can occur in the numeric engines
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecast math operations
pub type Result<T> = std::result::Result<T, MathError>;
