//! Additive trend + Fourier seasonality model
//!
//! `y(t) = trend(t) + sum_s seasonality_s(t) + sum_r beta_r * x_r(t)`
//!
//! - The trend is piecewise linear with hinge changepoints spread over the
//!   first `changepoint_range` share of the history.
//! - Each seasonality is a Fourier series of the configured order over
//!   absolute time in days, so a fitted model can be evaluated on any date.
//! - Extra regressors enter linearly.
//!
//! Coefficients are estimated jointly by penalised least squares on a scaled
//! target (`y / max|y|`) and scaled time (`[0, 1]` over the history). The
//! penalty of each block is `PRIOR_NOISE_VARIANCE / prior_scale^2`, so a larger
//! prior scale means a more flexible component.

use crate::linalg::ridge_least_squares;
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const YEARLY_PERIOD_DAYS: f64 = 365.25;
pub const WEEKLY_PERIOD_DAYS: f64 = 7.0;
pub const DAILY_PERIOD_DAYS: f64 = 1.0;

const PRIOR_NOISE_VARIANCE: f64 = 0.01;
const SLOPE_PENALTY: f64 = 1e-8;

/// One periodic component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityTerm {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
}

impl SeasonalityTerm {
    pub fn new(name: &str, period_days: f64, fourier_order: usize) -> Self {
        Self {
            name: name.to_string(),
            period_days,
            fourier_order,
        }
    }
}

/// Hyperparameters of the additive model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditiveModelParams {
    pub seasonalities: Vec<SeasonalityTerm>,
    pub n_changepoints: usize,
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub regressor_prior_scale: f64,
}

impl Default for AdditiveModelParams {
    fn default() -> Self {
        Self {
            seasonalities: Vec::new(),
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            regressor_prior_scale: 10.0,
        }
    }
}

impl AdditiveModelParams {
    pub fn with_seasonality(mut self, term: SeasonalityTerm) -> Self {
        self.seasonalities.push(term);
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(MathError::InvalidInput(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        for scale in [
            self.changepoint_prior_scale,
            self.seasonality_prior_scale,
            self.regressor_prior_scale,
        ] {
            if scale <= 0.0 || !scale.is_finite() {
                return Err(MathError::InvalidInput(format!(
                    "Prior scales must be positive, got {scale}"
                )));
            }
        }
        for term in &self.seasonalities {
            if term.period_days <= 0.0 || term.fourier_order == 0 {
                return Err(MathError::InvalidInput(format!(
                    "Seasonality '{}' needs a positive period and order",
                    term.name
                )));
            }
        }
        Ok(())
    }
}

/// Per-timestamp decomposition, in the units of the original target
#[derive(Debug, Clone, PartialEq)]
pub struct Components {
    pub trend: f64,
    /// One value per configured seasonality, in parameter order
    pub seasonal: Vec<f64>,
    pub extra_regressors: f64,
    pub yhat: f64,
}

/// A fitted additive model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditiveModel {
    params: AdditiveModelParams,
    t_start: f64,
    t_scale: f64,
    y_scale: f64,
    /// Changepoint locations on the scaled time axis
    changepoints: Vec<f64>,
    n_regressors: usize,
    coefficients: Vec<f64>,
}

impl AdditiveModel {
    /// Fit on observations at `t_days` (days since any fixed epoch).
    ///
    /// `regressors` is column-major: one vector per regressor, each the same
    /// length as `y`.
    pub fn fit(
        params: &AdditiveModelParams,
        t_days: &[f64],
        y: &[f64],
        regressors: &[Vec<f64>],
    ) -> Result<Self> {
        params.validate()?;
        if t_days.len() != y.len() {
            return Err(MathError::InvalidInput(format!(
                "{} timestamps for {} observations",
                t_days.len(),
                y.len()
            )));
        }
        if y.len() < 2 {
            return Err(MathError::InsufficientData(format!(
                "Need at least 2 observations, got {}",
                y.len()
            )));
        }
        if y.iter().chain(t_days).any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Timestamps and observations must be finite".to_string(),
            ));
        }
        check_regressors(regressors, y.len())?;

        let t_start = t_days.iter().copied().fold(f64::INFINITY, f64::min);
        let t_end = t_days.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let t_scale = if t_end > t_start { t_end - t_start } else { 1.0 };

        let y_max = y.iter().map(|v| v.abs()).fold(0.0, f64::max);
        let y_scale = if y_max > 0.0 { y_max } else { 1.0 };

        let mut scaled_t: Vec<f64> = t_days.iter().map(|t| (t - t_start) / t_scale).collect();
        scaled_t.sort_by(f64::total_cmp);
        let changepoints = place_changepoints(&scaled_t, params);

        let mut model = Self {
            params: params.clone(),
            t_start,
            t_scale,
            y_scale,
            changepoints,
            n_regressors: regressors.len(),
            coefficients: Vec::new(),
        };

        let design: Vec<Vec<f64>> = (0..y.len())
            .map(|i| model.design_row(t_days[i], regressors.iter().map(|r| r[i])))
            .collect();
        let target: Vec<f64> = y.iter().map(|v| v / y_scale).collect();
        let penalty = model.penalty();

        model.coefficients = ridge_least_squares(&design, &target, &penalty)?;
        Ok(model)
    }

    /// Check a model that did not come from [`AdditiveModel::fit`], e.g. one
    /// read back from disk, before it is evaluated
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        if self.coefficients.len() != self.n_columns() {
            return Err(MathError::InvalidInput(format!(
                "Model has {} coefficients, its terms need {}",
                self.coefficients.len(),
                self.n_columns()
            )));
        }
        let scalars = [self.t_start, self.t_scale, self.y_scale];
        if scalars.iter().chain(&self.coefficients).any(|v| !v.is_finite())
            || self.t_scale <= 0.0
            || self.y_scale <= 0.0
        {
            return Err(MathError::InvalidInput(
                "Model scales and coefficients must be finite, scales positive".to_string(),
            ));
        }
        if self.changepoints.iter().any(|c| !c.is_finite())
            || self.changepoints.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(MathError::InvalidInput(
                "Changepoints must be finite and strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Decompose the fitted model at new timestamps
    pub fn decompose(&self, t_days: &[f64], regressors: &[Vec<f64>]) -> Result<Vec<Components>> {
        if self.coefficients.len() != self.n_columns() {
            return Err(MathError::InvalidInput(format!(
                "Model has {} coefficients, its terms need {}",
                self.coefficients.len(),
                self.n_columns()
            )));
        }
        if regressors.len() != self.n_regressors {
            return Err(MathError::InvalidInput(format!(
                "Model was fitted with {} regressors, got {}",
                self.n_regressors,
                regressors.len()
            )));
        }
        check_regressors(regressors, t_days.len())?;

        let n_cp = self.changepoints.len();
        let mut out = Vec::with_capacity(t_days.len());
        for (i, &t) in t_days.iter().enumerate() {
            let row = self.design_row(t, regressors.iter().map(|r| r[i]));
            let contribution = |range: std::ops::Range<usize>| -> f64 {
                range
                    .map(|j| row[j] * self.coefficients[j])
                    .sum::<f64>()
                    * self.y_scale
            };

            let trend = contribution(0..2 + n_cp);
            let mut offset = 2 + n_cp;
            let mut seasonal = Vec::with_capacity(self.params.seasonalities.len());
            for term in &self.params.seasonalities {
                let width = 2 * term.fourier_order;
                seasonal.push(contribution(offset..offset + width));
                offset += width;
            }
            let extra_regressors = contribution(offset..offset + self.n_regressors);
            let yhat = trend + seasonal.iter().sum::<f64>() + extra_regressors;

            out.push(Components {
                trend,
                seasonal,
                extra_regressors,
                yhat,
            });
        }
        Ok(out)
    }

    /// Index of a seasonality by name, usable against `Components::seasonal`
    pub fn seasonality_index(&self, name: &str) -> Option<usize> {
        self.params.seasonalities.iter().position(|s| s.name == name)
    }

    pub fn params(&self) -> &AdditiveModelParams {
        &self.params
    }

    pub fn n_regressors(&self) -> usize {
        self.n_regressors
    }

    pub fn changepoints(&self) -> &[f64] {
        &self.changepoints
    }

    fn design_row(&self, t_days: f64, regressors: impl Iterator<Item = f64>) -> Vec<f64> {
        let t = (t_days - self.t_start) / self.t_scale;
        let mut row = Vec::with_capacity(self.n_columns());

        row.push(1.0);
        row.push(t);
        for &c in &self.changepoints {
            row.push((t - c).max(0.0));
        }
        for term in &self.params.seasonalities {
            for k in 1..=term.fourier_order {
                let angle = 2.0 * PI * k as f64 * t_days / term.period_days;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        row.extend(regressors);
        row
    }

    fn n_columns(&self) -> usize {
        let seasonal: usize = self
            .params
            .seasonalities
            .iter()
            .map(|s| 2 * s.fourier_order)
            .sum();
        2 + self.changepoints.len() + seasonal + self.n_regressors
    }

    fn penalty(&self) -> Vec<f64> {
        let prior = |scale: f64| PRIOR_NOISE_VARIANCE / (scale * scale);
        let mut penalty = Vec::with_capacity(self.n_columns());

        penalty.push(0.0);
        penalty.push(SLOPE_PENALTY);
        penalty.extend(std::iter::repeat(prior(self.params.changepoint_prior_scale)).take(self.changepoints.len()));
        let seasonal_width: usize = self
            .params
            .seasonalities
            .iter()
            .map(|s| 2 * s.fourier_order)
            .sum();
        penalty.extend(std::iter::repeat(prior(self.params.seasonality_prior_scale)).take(seasonal_width));
        penalty.extend(std::iter::repeat(prior(self.params.regressor_prior_scale)).take(self.n_regressors));
        penalty
    }
}

fn check_regressors(regressors: &[Vec<f64>], n: usize) -> Result<()> {
    for (i, r) in regressors.iter().enumerate() {
        if r.len() != n {
            return Err(MathError::InvalidInput(format!(
                "Regressor {i} has {} values, expected {n}",
                r.len()
            )));
        }
        if r.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(format!(
                "Regressor {i} contains non-finite values"
            )));
        }
    }
    Ok(())
}

/// Evenly spaced changepoints over the first `changepoint_range` of the
/// sorted, scaled history (the first observation is never a changepoint).
fn place_changepoints(sorted_t: &[f64], params: &AdditiveModelParams) -> Vec<f64> {
    let hist_size = (sorted_t.len() as f64 * params.changepoint_range).floor() as usize;
    let n = params.n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    let mut points: Vec<f64> = (1..=n)
        .map(|i| {
            let idx = (last * i as f64 / n as f64).round() as usize;
            sorted_t[idx]
        })
        .collect();
    points.dedup();
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weekly_days(n: usize) -> Vec<f64> {
        (0..n).map(|i| 14_645.0 + 7.0 * i as f64).collect()
    }

    fn yearly_params() -> AdditiveModelParams {
        AdditiveModelParams::default()
            .with_seasonality(SeasonalityTerm::new("yearly", YEARLY_PERIOD_DAYS, 10))
            .with_seasonality(SeasonalityTerm::new("weekly", WEEKLY_PERIOD_DAYS, 3))
    }

    #[test]
    fn test_fits_trend_and_yearly_cycle() {
        let t = weekly_days(156);
        let y: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, &d)| 1000.0 + 2.0 * i as f64 + 150.0 * (2.0 * PI * d / YEARLY_PERIOD_DAYS).sin())
            .collect();

        let model = AdditiveModel::fit(&yearly_params(), &t, &y, &[]).unwrap();
        let parts = model.decompose(&t, &[]).unwrap();

        let mae: f64 = parts
            .iter()
            .zip(&y)
            .map(|(c, actual)| (c.yhat - actual).abs())
            .sum::<f64>()
            / y.len() as f64;
        assert!(mae < 10.0, "in-sample MAE too large: {mae}");

        let yearly = model.seasonality_index("yearly").unwrap();
        let amplitude = parts.iter().map(|c| c.seasonal[yearly]).fold(0.0, f64::max);
        assert!(amplitude > 100.0 && amplitude < 200.0);
    }

    #[test]
    fn test_components_sum_to_yhat() {
        let t = weekly_days(60);
        let y: Vec<f64> = (0..60).map(|i| 50.0 + (i % 5) as f64).collect();
        let holiday: Vec<f64> = (0..60).map(|i| if i % 13 == 0 { 1.0 } else { 0.0 }).collect();

        let model = AdditiveModel::fit(&yearly_params(), &t, &y, &[holiday.clone()]).unwrap();
        for c in model.decompose(&t, &[holiday]).unwrap() {
            let total = c.trend + c.seasonal.iter().sum::<f64>() + c.extra_regressors;
            assert_relative_eq!(total, c.yhat, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_regressor_effect_is_learned() {
        let t = weekly_days(104);
        let holiday: Vec<f64> = (0..104).map(|i| if i % 10 == 3 { 1.0 } else { 0.0 }).collect();
        let y: Vec<f64> = holiday.iter().map(|h| 500.0 + 300.0 * h).collect();

        let model = AdditiveModel::fit(&AdditiveModelParams::default(), &t, &y, &[holiday]).unwrap();
        let parts = model.decompose(&t[..2], &[vec![1.0, 0.0]]).unwrap();
        assert_relative_eq!(parts[0].extra_regressors, 300.0, epsilon = 5.0);
        assert_relative_eq!(parts[1].extra_regressors, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_changepoints_within_range() {
        let t = weekly_days(100);
        let y: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let model = AdditiveModel::fit(&AdditiveModelParams::default(), &t, &y, &[]).unwrap();

        assert_eq!(model.changepoints().len(), 25);
        assert!(model.changepoints().iter().all(|&c| c > 0.0 && c <= 0.8));
    }

    #[test]
    fn test_validate_rejects_inconsistent_models() {
        let t = weekly_days(60);
        let y: Vec<f64> = (0..60).map(|i| 10.0 + i as f64).collect();
        let model = AdditiveModel::fit(&yearly_params(), &t, &y, &[]).unwrap();
        assert!(model.validate().is_ok());

        let mut short = model.clone();
        short.coefficients = vec![1.0, 2.0];
        assert!(short.validate().is_err());
        assert!(short.decompose(&t, &[]).is_err());

        let mut infinite = model.clone();
        infinite.coefficients[0] = f64::INFINITY;
        assert!(infinite.validate().is_err());

        let mut unsorted = model.clone();
        unsorted.changepoints.reverse();
        assert!(unsorted.validate().is_err());

        let mut extra_term = model;
        extra_term.params.seasonalities.push(SeasonalityTerm::new("daily", DAILY_PERIOD_DAYS, 4));
        assert!(extra_term.validate().is_err());
    }

    #[test]
    fn test_input_validation() {
        let params = AdditiveModelParams::default();
        assert!(AdditiveModel::fit(&params, &[1.0], &[1.0], &[]).is_err());
        assert!(AdditiveModel::fit(&params, &[1.0, 2.0], &[1.0], &[]).is_err());
        assert!(AdditiveModel::fit(&params, &[1.0, 2.0], &[1.0, f64::NAN], &[]).is_err());
        assert!(AdditiveModel::fit(&params, &[1.0, 2.0], &[1.0, 2.0], &[vec![1.0]]).is_err());

        let model = AdditiveModel::fit(&params, &[1.0, 2.0], &[1.0, 2.0], &[]).unwrap();
        assert!(model.decompose(&[3.0], &[vec![0.0]]).is_err());
    }
}
