//! Volatility indicator implementations
//!
//! Contains implementations of:
//! - Rolling sample standard deviation
//! - Bollinger Bands

use crate::moving_averages::rolling_mean;
use crate::{check_period, MathError, Result};

/// Rolling sample standard deviation (n - 1 denominator) over `window` values.
///
/// A window of one value has no sample deviation and yields `NaN`.
pub fn rolling_std(values: &[f64], window: usize) -> Result<Vec<f64>> {
    check_period(window, "Window")?;

    let mut result = vec![f64::NAN; values.len()];
    if window < 2 || values.len() < window {
        return Ok(result);
    }

    for end in window..=values.len() {
        let slice = &values[end - window..end];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let variance = slice
            .iter()
            .map(|&v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (window - 1) as f64;
        result[end - 1] = variance.sqrt();
    }

    Ok(result)
}

/// Bollinger band lines aligned with the input series
#[derive(Debug, Clone)]
pub struct BollingerBands {
    /// Rolling mean
    pub middle: Vec<f64>,
    /// Mean plus `k` standard deviations
    pub upper: Vec<f64>,
    /// Mean minus `k` standard deviations
    pub lower: Vec<f64>,
}

/// Calculate Bollinger Bands over `window` values with a `k` deviation envelope
pub fn bollinger_bands(values: &[f64], window: usize, k: f64) -> Result<BollingerBands> {
    if k <= 0.0 {
        return Err(MathError::InvalidInput(
            "Standard deviation multiplier must be greater than zero".to_string(),
        ));
    }

    let middle = rolling_mean(values, window)?;
    let std_dev = rolling_std(values, window)?;

    let upper = middle
        .iter()
        .zip(&std_dev)
        .map(|(m, s)| m + k * s)
        .collect();
    let lower = middle
        .iter()
        .zip(&std_dev)
        .map(|(m, s)| m - k * s)
        .collect();

    Ok(BollingerBands {
        middle,
        upper,
        lower,
    })
}
