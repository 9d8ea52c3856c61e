//! # Sales Forecast
//!
//! Hybrid weekly sales forecasting per (Store, Dept) group.
//!
//! ## Features
//!
//! - Loading and merging the sales, features and stores tables
//! - Calendar, lag and shifted rolling-mean features computed per group
//! - An additive trend + Fourier seasonality baseline
//! - A gradient-boosted model of the baseline's residual
//! - Training, evaluation and future inference over persisted per-group models
//! - A dashboard view-model: group list, overlay toggle, metrics deltas, exports
//!
//! ## Quick Start
//!
//! ```no_run
//! use indicatif::ProgressBar;
//! use sales_forecast::{forecast_future, run_training, GroupKey, HybridConfig};
//!
//! fn main() -> sales_forecast::Result<()> {
//!     let config = HybridConfig::from_env()?;
//!
//!     // Train the first ten groups and persist models, forecasts and metrics
//!     let summary = run_training(&config, Some(10), &ProgressBar::hidden())?;
//!     println!("trained {} groups", summary.trained());
//!
//!     // Twelve weeks past the last observed date
//!     let forecast = forecast_future(&config, GroupKey::new(1, 1), 12)?;
//!     for row in &forecast {
//!         println!("{} {:.2}", row.date, row.yhat_hybrid);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod forecast;
pub mod inference;
pub mod metrics;
pub mod models;
pub mod synthetic;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use crate::config::HybridConfig;
pub use crate::data::{DataLoader, GroupKey, Observation, SalesFrame};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluation::{evaluate, MetricsSummary};
pub use crate::forecast::ForecastRecord;
pub use crate::inference::forecast_future;
pub use crate::metrics::{ForecastMetrics, MetricsRecord};
pub use crate::models::{ForecastModel, TrainedModel};
pub use crate::training::{run_training, train_one_group, TrainingSummary};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
