//! # Trade Math
//!
//! Vectorised technical indicator calculations over price slices.
//!
//! Every function takes a slice of values and returns a vector of the same
//! length. Positions where the lookback window is not yet satisfied hold
//! `f64::NAN`, so the output lines up row-for-row with the input series.

use thiserror::Error;

// Indicator modules
pub mod moving_averages;
pub mod oscillators;
pub mod returns;
pub mod volatility;

/// Errors that can occur in trading-related calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for trading math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Reject zero-length windows and periods
pub(crate) fn check_period(period: usize, what: &str) -> Result<()> {
    if period == 0 {
        return Err(MathError::InvalidInput(format!(
            "{} must be greater than zero",
            what
        )));
    }
    Ok(())
}
