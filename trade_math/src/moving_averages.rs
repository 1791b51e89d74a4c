//! Moving average calculation implementations
//!
//! Contains implementations of:
//! - Rolling (simple) mean over a fixed window
//! - Exponential Moving Average (EMA) seeded with the first observation

use crate::{check_period, Result};

/// Rolling mean over `window` values.
///
/// The first `window - 1` positions are `NaN`, as is any window that contains
/// a `NaN`.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<f64>> {
    check_period(window, "Window")?;

    let mut result = vec![f64::NAN; values.len()];
    if values.len() < window {
        return Ok(result);
    }

    for end in window..=values.len() {
        let slice = &values[end - window..end];
        result[end - 1] = slice.iter().sum::<f64>() / window as f64;
    }

    Ok(result)
}

/// Exponential Moving Average (EMA) without warm-up adjustment.
///
/// The first observation seeds the average and every later value is blended
/// in with `alpha = 2 / (span + 1)`. Missing (`NaN`) inputs leave the current
/// average unchanged.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    span: usize,
    alpha: f64,
    current_ema: Option<f64>,
}

impl ExponentialMovingAverage {
    /// Create a new Exponential Moving Average with the specified span
    pub fn new(span: usize) -> Result<Self> {
        check_period(span, "Span")?;

        Ok(Self {
            span,
            alpha: 2.0 / (span as f64 + 1.0),
            current_ema: None,
        })
    }

    /// Update the EMA with a new value and return the current average
    pub fn update(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            return self.current_ema.unwrap_or(f64::NAN);
        }

        let next = match self.current_ema {
            None => value,
            Some(current) => current + self.alpha * (value - current),
        };
        self.current_ema = Some(next);
        next
    }

    /// Get the current EMA value, `NaN` before the first observation
    pub fn value(&self) -> f64 {
        self.current_ema.unwrap_or(f64::NAN)
    }

    /// Get the span
    pub fn span(&self) -> usize {
        self.span
    }

    /// Reset the EMA, clearing all state
    pub fn reset(&mut self) {
        self.current_ema = None;
    }
}

/// Exponential moving average of a whole series
pub fn ewm_mean(values: &[f64], span: usize) -> Result<Vec<f64>> {
    let mut ema = ExponentialMovingAverage::new(span)?;
    Ok(values.iter().map(|&v| ema.update(v)).collect())
}
