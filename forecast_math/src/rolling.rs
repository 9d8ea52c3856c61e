//! Lag and rolling-window transforms over a single ordered series
//!
//! Every function here assumes its input belongs to exactly one series and is
//! already sorted by time. Callers that hold several series interleaved must
//! split them first.

use crate::{MathError, Result};
use num_traits::Float;
use std::collections::VecDeque;

/// Simple Moving Average over a fixed window
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage<T: Float> {
    period: usize,
    values: VecDeque<T>,
    sum: T,
}

impl<T: Float> SimpleMovingAverage<T> {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period + 1),
            sum: T::zero(),
        })
    }

    /// Push a value, evicting the oldest once the window is full
    pub fn update(&mut self, value: T) {
        self.values.push_back(value);
        self.sum = self.sum + value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum = self.sum - old_value;
            }
        }
    }

    /// Current mean, or `None` until `period` values have been seen
    pub fn value(&self) -> Option<T> {
        if self.values.len() < self.period {
            return None;
        }
        let n = T::from(self.period)?;
        Some(self.sum / n)
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = T::zero();
    }
}

/// `out[t] = values[t - lag]`, `None` for the first `lag` positions.
pub fn lagged<T: Float>(values: &[T], lag: usize) -> Result<Vec<Option<T>>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Lag must be greater than zero".to_string(),
        ));
    }

    Ok((0..values.len())
        .map(|t| if t >= lag { Some(values[t - lag]) } else { None })
        .collect())
}

/// Mean of the `window` values strictly before each position.
///
/// The current value is never part of its own window, so position `t` is
/// `None` until `t >= window`.
pub fn shifted_rolling_mean<T: Float>(values: &[T], window: usize) -> Result<Vec<Option<T>>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    let mut out = Vec::with_capacity(values.len());

    for &value in values {
        out.push(sma.value());
        sma.update(value);
    }

    Ok(out)
}
