//! Shifts and returns

use crate::{check_period, Result};

/// Lag a series by `periods` positions, filling the head with `NaN`
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= periods { values[i - periods] } else { f64::NAN })
        .collect()
}

/// Percentage change over `periods` positions: `x[i] / x[i - periods] - 1`
pub fn pct_change(values: &[f64], periods: usize) -> Result<Vec<f64>> {
    check_period(periods, "Periods")?;

    Ok(values
        .iter()
        .zip(shift(values, periods))
        .map(|(current, previous)| current / previous - 1.0)
        .collect())
}

/// Log returns derived from percentage returns, `ln(1 + r)`
pub fn log_returns(pct: &[f64]) -> Vec<f64> {
    pct.iter().map(|r| r.ln_1p()).collect()
}
