//! # Quantile Forecast
//!
//! Multi-horizon quantile forecasting for daily time series.
//!
//! ## Features
//!
//! - Feature pipeline (returns, lags, rolling statistics, RSI, MACD, Bollinger bands, calendar)
//! - Gradient-boosted quantile regression, one model per (horizon, step, quantile)
//! - Artifact store supporting legacy single-horizon and multi-horizon layouts, with bounded caches
//! - Forecast engine with graceful horizon substitution and direct multi-step forecasts
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use quantile_forecast::config::TrainingConfig;
//! use quantile_forecast::data::{CsvSeriesProvider, DateRange, SeriesProvider};
//! use quantile_forecast::engine::{ForecastEngine, PredictRequest};
//! use quantile_forecast::store::ArtifactStore;
//! use quantile_forecast::training::TrainingOrchestrator;
//!
//! # fn main() -> quantile_forecast::Result<()> {
//! let provider = CsvSeriesProvider::new("data");
//! let store = Arc::new(ArtifactStore::open("models")?);
//!
//! // Train horizons 5 and 10 for the default quantiles
//! let observations = provider.fetch("AAPL", DateRange::unbounded())?;
//! let config = TrainingConfig {
//!     horizons: vec![5, 10],
//!     ..TrainingConfig::default()
//! };
//! TrainingOrchestrator::new(&store).train("AAPL", &observations, &config)?;
//!
//! // Horizon 7 is served by the 10-step models, with a note
//! let engine = ForecastEngine::new(Arc::clone(&store));
//! let response = engine.predict(&PredictRequest::new("AAPL", 7), &provider)?;
//! assert_eq!(response.horizon, 10);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod store;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{Observation, SeriesProvider};
pub use crate::engine::{Forecast, ForecastEngine, ForecastResponse, PredictRequest};
pub use crate::error::{ForecastError, Result};
pub use crate::features::{transform, FeatureFrame, FeatureSnapshot};
pub use crate::store::{ArtifactStore, MetadataRecord, ModelBundle};
pub use crate::training::TrainingOrchestrator;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
