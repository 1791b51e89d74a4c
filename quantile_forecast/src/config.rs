//! Configuration for training runs and the artifact store

use crate::error::{ForecastError, Result};
use crate::models::GbmParams;
use crate::utils::percentile_key;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Lags of the primary value copied into the feature frame
pub const LAGS: [usize; 9] = [1, 2, 3, 5, 7, 10, 14, 21, 30];

/// Windows for rolling mean / standard deviation features
pub const ROLLING_WINDOWS: [usize; 5] = [5, 10, 14, 20, 30];

pub const RSI_WINDOW: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_K: f64 = 2.0;

/// Share of the aligned rows held out (from the end) for validation
pub const VALIDATION_FRACTION: f64 = 0.1;

/// Quantiles trained when none are requested
pub const DEFAULT_QUANTILES: [f64; 3] = [0.1, 0.5, 0.9];

/// Horizon trained when none is requested
pub const DEFAULT_HORIZON: usize = 30;

/// Inclusive bounds for a serving request's horizon
pub const MIN_REQUEST_HORIZON: usize = 1;
pub const MAX_REQUEST_HORIZON: usize = 365;

/// Inclusive bounds and default for the number of historical rows echoed back
pub const MIN_RECENT_ROWS: usize = 50;
pub const MAX_RECENT_ROWS: usize = 2000;
pub const DEFAULT_RECENT_ROWS: usize = 200;

pub const METADATA_FILE: &str = "metadata.json";
pub const ARTIFACT_EXTENSION: &str = "json";

/// Directory used when no models directory is configured
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Environment variable overriding the models directory
pub const MODELS_DIR_ENV: &str = "QUANTILE_MODELS_DIR";

pub const DEFAULT_METADATA_CAPACITY: usize = 16;
pub const DEFAULT_BUNDLE_CAPACITY: usize = 32;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Where artifacts live and how many parsed records/bundles stay cached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub models_dir: PathBuf,
    pub metadata_capacity: usize,
    pub bundle_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            metadata_capacity: DEFAULT_METADATA_CAPACITY,
            bundle_capacity: DEFAULT_BUNDLE_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Store rooted at `models_dir` with default cache capacities
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Set both cache capacities
    pub fn with_capacities(mut self, metadata_capacity: usize, bundle_capacity: usize) -> Self {
        self.metadata_capacity = metadata_capacity;
        self.bundle_capacity = bundle_capacity;
        self
    }

    /// Defaults, with the models directory taken from the environment if set
    pub fn from_env() -> Self {
        match std::env::var(MODELS_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::new(dir.trim()),
            _ => Self::default(),
        }
    }

    /// Load and validate a store configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metadata_capacity == 0 || self.bundle_capacity == 0 {
            return Err(ForecastError::InvalidParameter(
                "Cache capacities must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a training run fits: horizons, quantiles and model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub horizons: Vec<usize>,
    pub quantiles: Vec<f64>,
    pub params: GbmParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            horizons: vec![DEFAULT_HORIZON],
            quantiles: DEFAULT_QUANTILES.to_vec(),
            params: GbmParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Create a validated training configuration
    pub fn new(horizons: Vec<usize>, quantiles: Vec<f64>, params: GbmParams) -> Result<Self> {
        let config = Self {
            horizons,
            quantiles,
            params,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a training configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Requested horizons, ascending and without duplicates
    pub fn sorted_horizons(&self) -> Vec<usize> {
        let mut horizons = self.horizons.clone();
        horizons.sort_unstable();
        horizons.dedup();
        horizons
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizons.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one horizon is required".to_string(),
            ));
        }
        if self.horizons.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "Horizons must be greater than zero".to_string(),
            ));
        }
        validate_quantiles(&self.quantiles)?;
        self.params.validate()
    }
}

/// Quantiles must lie strictly inside (0, 1) and map to distinct percentile keys
pub fn validate_quantiles(quantiles: &[f64]) -> Result<()> {
    if quantiles.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "At least one quantile is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for &q in quantiles {
        if !(q > 0.0 && q < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Quantile {} must be between 0 and 1",
                q
            )));
        }
        if !seen.insert(percentile_key(q)) {
            return Err(ForecastError::InvalidParameter(format!(
                "Quantile {} duplicates percentile q{}",
                q,
                percentile_key(q)
            )));
        }
    }
    Ok(())
}
