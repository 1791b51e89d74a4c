//! Persisted description of a series' trained model set
//!
//! Two record shapes exist on disk: legacy records carry a scalar `horizon`,
//! multi-horizon records carry `horizons` plus `default_horizon`. Both are
//! parsed once into [`MetadataRecord`] with a [`HorizonLayout`] tag, so
//! nothing past the load boundary branches on JSON shape.

use crate::config::validate_quantiles;
use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Validation metrics of one step, keyed `q{pct}_mae` / `q{pct}_pinball`
pub type StepMetrics = BTreeMap<String, f64>;

/// Validation metrics of one horizon, keyed by step (1-based)
pub type HorizonMetrics = BTreeMap<usize, StepMetrics>;

/// How the trained horizons of a record are laid out on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HorizonLayout {
    /// One horizon, artifacts directly under the series directory
    Legacy { horizon: usize },
    /// Several horizons, artifacts under `H{horizon}/`
    MultiHorizon {
        horizons: Vec<usize>,
        default_horizon: usize,
    },
}

/// Metadata of one series' trained model set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetadata", into = "RawMetadata")]
pub struct MetadataRecord {
    pub ticker: String,
    pub layout: HorizonLayout,
    pub quantiles: Vec<f64>,
    /// Feature columns in the order the models were fitted on
    pub feature_cols: Vec<String>,
    pub metrics: BTreeMap<usize, HorizonMetrics>,
    pub trained_at: DateTime<Utc>,
    pub rows: usize,
}

/// Short listing entry for a trained series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub ticker: String,
    pub horizons: Vec<usize>,
    pub default_horizon: usize,
    pub rows: usize,
}

/// Wire shape of the metadata file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawMetadata {
    ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    horizons: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    horizon: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_horizon: Option<usize>,
    quantiles: Vec<f64>,
    feature_cols: Vec<String>,
    #[serde(default)]
    metrics: BTreeMap<String, Value>,
    trained_at: String,
    rows: usize,
}

pub fn horizon_key(horizon: usize) -> String {
    format!("H{}", horizon)
}

pub fn step_key(step: usize) -> String {
    format!("step_{}", step)
}

fn parse_prefixed(key: &str, prefix: &str) -> Option<usize> {
    key.strip_prefix(prefix)?.parse().ok()
}

fn parse_step_map(horizon: usize, value: Value) -> Result<HorizonMetrics> {
    let steps: BTreeMap<String, StepMetrics> = serde_json::from_value(value)?;
    steps
        .into_iter()
        .map(|(key, metrics)| {
            parse_prefixed(&key, "step_")
                .map(|step| (step, metrics))
                .ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Unexpected metrics key '{}' for horizon {}",
                        key, horizon
                    ))
                })
        })
        .collect()
}

/// Accepts `2024-01-01T00:00:00Z`, offsets, or a naive timestamp taken as UTC
fn parse_trained_at(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| ForecastError::DataError(format!("Invalid trained_at '{}': {}", value, e)))
}

impl TryFrom<RawMetadata> for MetadataRecord {
    type Error = ForecastError;

    fn try_from(raw: RawMetadata) -> Result<Self> {
        let layout = match (raw.horizons, raw.horizon) {
            (Some(horizons), None) => {
                if horizons.is_empty() || horizons.contains(&0) {
                    return Err(ForecastError::DataError(format!(
                        "Invalid trained horizons {:?}",
                        horizons
                    )));
                }
                let default_horizon = match raw.default_horizon {
                    Some(h) => h,
                    None => *horizons.last().unwrap_or(&0),
                };
                if !horizons.contains(&default_horizon) {
                    return Err(ForecastError::DataError(format!(
                        "Default horizon {} is not among trained horizons {:?}",
                        default_horizon, horizons
                    )));
                }
                HorizonLayout::MultiHorizon {
                    horizons,
                    default_horizon,
                }
            }
            (None, Some(horizon)) if horizon > 0 => HorizonLayout::Legacy { horizon },
            (None, Some(_)) => {
                return Err(ForecastError::DataError(
                    "Legacy horizon must be greater than zero".to_string(),
                ))
            }
            _ => {
                return Err(ForecastError::DataError(
                    "Metadata must carry exactly one of 'horizons' or 'horizon'".to_string(),
                ))
            }
        };

        validate_quantiles(&raw.quantiles)
            .map_err(|e| ForecastError::DataError(format!("Invalid metadata quantiles: {}", e)))?;
        if raw.feature_cols.is_empty() {
            return Err(ForecastError::DataError(
                "Metadata lists no feature columns".to_string(),
            ));
        }

        // Legacy files may store step metrics flat rather than under H{h}
        let mut metrics = BTreeMap::new();
        let mut flat = serde_json::Map::new();
        for (key, value) in raw.metrics {
            if let Some(horizon) = parse_prefixed(&key, "H") {
                metrics.insert(horizon, parse_step_map(horizon, value)?);
            } else if key.starts_with("step_") {
                flat.insert(key, value);
            } else {
                return Err(ForecastError::DataError(format!(
                    "Unexpected metrics key '{}'",
                    key
                )));
            }
        }
        if !flat.is_empty() {
            match layout {
                HorizonLayout::Legacy { horizon } => {
                    let steps = parse_step_map(horizon, Value::Object(flat))?;
                    metrics.entry(horizon).or_default().extend(steps);
                }
                HorizonLayout::MultiHorizon { .. } => {
                    return Err(ForecastError::DataError(
                        "Multi-horizon metrics must be grouped by horizon".to_string(),
                    ))
                }
            }
        }

        Ok(Self {
            ticker: raw.ticker,
            layout,
            quantiles: raw.quantiles,
            feature_cols: raw.feature_cols,
            metrics,
            trained_at: parse_trained_at(&raw.trained_at)?,
            rows: raw.rows,
        })
    }
}

impl From<MetadataRecord> for RawMetadata {
    fn from(record: MetadataRecord) -> Self {
        let (horizons, horizon, default_horizon) = match record.layout {
            HorizonLayout::Legacy { horizon } => (None, Some(horizon), None),
            HorizonLayout::MultiHorizon {
                horizons,
                default_horizon,
            } => (Some(horizons), None, Some(default_horizon)),
        };

        let metrics = record
            .metrics
            .into_iter()
            .map(|(h, steps)| {
                let steps: serde_json::Map<String, Value> = steps
                    .into_iter()
                    .map(|(s, values)| {
                        let values = values.into_iter().map(|(k, v)| (k, Value::from(v)));
                        (step_key(s), Value::Object(values.collect()))
                    })
                    .collect();
                (horizon_key(h), Value::Object(steps))
            })
            .collect();

        Self {
            ticker: record.ticker,
            horizons,
            horizon,
            default_horizon,
            quantiles: record.quantiles,
            feature_cols: record.feature_cols,
            metrics,
            trained_at: record.trained_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            rows: record.rows,
        }
    }
}

impl MetadataRecord {
    /// Record for a multi-horizon training run; the largest horizon is the default
    pub fn multi_horizon(
        ticker: &str,
        horizons: Vec<usize>,
        quantiles: Vec<f64>,
        feature_cols: Vec<String>,
        metrics: BTreeMap<usize, HorizonMetrics>,
        trained_at: DateTime<Utc>,
        rows: usize,
    ) -> Result<Self> {
        let default_horizon = horizons.iter().copied().max().ok_or_else(|| {
            ForecastError::InvalidParameter("At least one horizon is required".to_string())
        })?;
        Ok(Self {
            ticker: ticker.to_string(),
            layout: HorizonLayout::MultiHorizon {
                horizons,
                default_horizon,
            },
            quantiles,
            feature_cols,
            metrics,
            trained_at,
            rows,
        })
    }

    /// Trained horizons, in recorded order
    pub fn horizons(&self) -> Vec<usize> {
        match &self.layout {
            HorizonLayout::Legacy { horizon } => vec![*horizon],
            HorizonLayout::MultiHorizon { horizons, .. } => horizons.clone(),
        }
    }

    pub fn default_horizon(&self) -> usize {
        match &self.layout {
            HorizonLayout::Legacy { horizon } => *horizon,
            HorizonLayout::MultiHorizon {
                default_horizon, ..
            } => *default_horizon,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.layout, HorizonLayout::Legacy { .. })
    }

    pub fn has_horizon(&self, horizon: usize) -> bool {
        self.horizons().contains(&horizon)
    }

    /// Strict horizon lookup: `None` selects the default, anything untrained
    /// is `HorizonUnavailable`
    pub fn resolve(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_horizon()),
            Some(h) if self.has_horizon(h) => Ok(h),
            Some(h) => Err(ForecastError::HorizonUnavailable {
                requested: h,
                available: self.horizons(),
            }),
        }
    }

    /// Directory holding the artifacts of `horizon` inside `series_dir`
    pub fn artifact_dir(&self, series_dir: &Path, horizon: usize) -> PathBuf {
        match self.layout {
            HorizonLayout::Legacy { .. } => series_dir.to_path_buf(),
            HorizonLayout::MultiHorizon { .. } => series_dir.join(horizon_key(horizon)),
        }
    }

    pub fn metrics_for(&self, horizon: usize) -> Option<&HorizonMetrics> {
        self.metrics.get(&horizon)
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            ticker: self.ticker.clone(),
            horizons: self.horizons(),
            default_horizon: self.default_horizon(),
            rows: self.rows,
        }
    }
}
