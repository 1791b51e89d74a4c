//! Oscillator indicator implementations
//!
//! Contains implementations of:
//! - Relative Strength Index (RSI) from simple rolling means of gains/losses
//! - Moving Average Convergence Divergence (MACD)

use crate::moving_averages::{ewm_mean, rolling_mean};
use crate::{check_period, MathError, Result};

/// Relative Strength Index over `window` period-over-period deltas.
///
/// Gains and losses are averaged with a simple rolling mean. The first delta
/// has no predecessor and counts as neither a gain nor a loss.
///
/// `RSI = 100 - 100 / (1 + gain / loss)` is evaluated with plain IEEE-754
/// arithmetic: a zero average loss with positive gains gives 100, and a window
/// with neither gains nor losses gives `NaN`.
pub fn relative_strength_index(values: &[f64], window: usize) -> Result<Vec<f64>> {
    check_period(window, "Window")?;

    let mut gains = Vec::with_capacity(values.len());
    let mut losses = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let delta = if i == 0 {
            f64::NAN
        } else {
            values[i] - values[i - 1]
        };
        // NaN comparisons are false, so a missing delta lands on zero for both
        gains.push(if delta > 0.0 { delta } else { 0.0 });
        losses.push(if delta < 0.0 { -delta } else { 0.0 });
    }

    let avg_gain = rolling_mean(&gains, window)?;
    let avg_loss = rolling_mean(&losses, window)?;

    Ok(avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(gain, loss)| {
            let rs = gain / loss;
            100.0 - (100.0 / (1.0 + rs))
        })
        .collect())
}

/// MACD line, its signal line and the histogram, aligned with the input
#[derive(Debug, Clone)]
pub struct Macd {
    /// Fast EMA minus slow EMA
    pub macd: Vec<f64>,
    /// EMA of the MACD line
    pub signal: Vec<f64>,
    /// MACD line minus signal line
    pub histogram: Vec<f64>,
}

/// Calculate MACD with the given fast, slow and signal spans
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Result<Macd> {
    if fast >= slow {
        return Err(MathError::InvalidInput(
            "Fast period must be smaller than slow period".to_string(),
        ));
    }
    check_period(signal, "Signal period")?;

    let fast_ema = ewm_mean(values, fast)?;
    let slow_ema = ewm_mean(values, slow)?;

    let macd_line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ewm_mean(&macd_line, signal)?;
    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    Ok(Macd {
        macd: macd_line,
        signal: signal_line,
        histogram,
    })
}
