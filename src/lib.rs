//! # Hybrid Sales
//!
//! Workspace facade over the two member crates:
//!
//! - [`forecast_math`]: rolling windows, ridge least squares, the additive
//!   seasonal model and gradient-boosted trees
//! - [`sales_forecast`]: data loading, features, per-group training, inference,
//!   evaluation and the dashboard view-model
//!
//! ```
//! use hybrid_sales_workspace::sales_forecast::{GroupKey, HybridConfig};
//!
//! let config = HybridConfig::default();
//! let path = config.forecast_path(GroupKey::new(1, 1));
//! assert!(path.ends_with("forecasts/preds_1_1.csv"));
//! ```

pub use forecast_math;
pub use sales_forecast;

pub use sales_forecast::{forecast_future, run_training, GroupKey, HybridConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_crates_are_reachable() {
        assert_eq!(sales_forecast::NAME, "sales_forecast");
        assert_eq!(GroupKey::new(4, 2).to_string(), "4_2");
        assert!(HybridConfig::default().validate().is_ok());
    }
}
