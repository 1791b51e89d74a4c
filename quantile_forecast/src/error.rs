//! Error types for the quantile_forecast crate

use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the quantile_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// No metadata record exists for the series identifier
    #[error("Model not found for {0}: train first")]
    NotFound(String),

    /// The artifact store was asked for a horizon that was never trained
    #[error("Horizon {requested} unavailable (trained horizons: {available:?})")]
    HorizonUnavailable {
        requested: usize,
        available: Vec<usize>,
    },

    /// A model file implied by the metadata record is absent
    #[error("Missing model artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Not enough rows survive feature construction to train on
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A single model fit failed, aborting the run for its horizon
    #[error("Training failed for horizon {horizon}, step {step}, quantile {quantile}: {reason}")]
    TrainingFailure {
        horizon: usize,
        step: usize,
        quantile: f64,
        reason: String,
    },

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON encoding or decoding
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from indicator calculations
    #[error("Math error: {0}")]
    MathError(#[from] trade_math::MathError),
}

impl ForecastError {
    /// True when the series has no trained models at all
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForecastError::NotFound(_))
    }

    /// True for failures caused by the request rather than the system
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ForecastError::HorizonUnavailable { .. }
                | ForecastError::ValidationError(_)
                | ForecastError::InvalidParameter(_)
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
