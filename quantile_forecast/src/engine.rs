//! Online forecasting from stored model sets
//!
//! The engine is the policy layer over the strict [`ArtifactStore`]: an
//! untrained horizon is substituted by the nearest usable one and reported
//! in a note instead of failing. Forecasts are direct multi-step: every step
//! is predicted from the same feature snapshot.

use crate::config::{
    DEFAULT_HORIZON, DEFAULT_RECENT_ROWS, MAX_RECENT_ROWS, MAX_REQUEST_HORIZON, MIN_RECENT_ROWS,
    MIN_REQUEST_HORIZON,
};
use crate::data::{normalize_series_id, DateRange, SeriesProvider};
use crate::error::{ForecastError, Result};
use crate::features::{transform, FeatureSnapshot};
use crate::store::metadata::step_key;
use crate::store::{ArtifactStore, StepMetrics};
use crate::utils::{future_business_days, percentile_key};
use chrono::NaiveDate;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Horizon actually served for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HorizonResolution {
    pub horizon: usize,
    /// Set when the served horizon differs from the requested one
    pub note: Option<String>,
}

/// Pick the horizon to serve: the exact one if trained, else the smallest
/// trained horizon above the request, else the largest trained horizon.
pub fn resolve_horizon(trained: &[usize], requested: usize) -> Result<HorizonResolution> {
    if trained.contains(&requested) {
        return Ok(HorizonResolution {
            horizon: requested,
            note: None,
        });
    }

    let substitute = trained
        .iter()
        .copied()
        .filter(|&h| h >= requested)
        .min()
        .or_else(|| trained.iter().copied().max())
        .ok_or_else(|| ForecastError::HorizonUnavailable {
            requested,
            available: Vec::new(),
        })?;

    Ok(HorizonResolution {
        horizon: substitute,
        note: Some(format!(
            "Requested horizon {} not available; using {} from {:?}",
            requested, substitute, trained
        )),
    })
}

/// Quantile predictions for one future step
#[derive(Debug, Clone, PartialEq)]
pub struct StepForecast {
    pub step: usize,
    pub date: NaiveDate,
    /// `(percentile, value)` in metadata quantile order
    pub values: Vec<(u32, f64)>,
}

impl StepForecast {
    /// Value of the given quantile, if it was forecast
    pub fn value(&self, quantile: f64) -> Option<f64> {
        let key = percentile_key(quantile);
        self.values.iter().find(|(p, _)| *p == key).map(|(_, v)| *v)
    }
}

/// Serialized as `{"date": "2024-01-08", "p10": .., "p50": .., "p90": ..}`
impl Serialize for StepForecast {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        map.serialize_entry("date", &self.date.format("%Y-%m-%d").to_string())?;
        for (percentile, value) in &self.values {
            map.serialize_entry(&format!("p{}", percentile), value)?;
        }
        map.end()
    }
}

/// Multi-step forecast for one series
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub ticker: String,
    pub requested_horizon: usize,
    pub horizon: usize,
    pub note: Option<String>,
    /// Ascending by step
    pub steps: Vec<StepForecast>,
}

/// Serving request as received from the HTTP layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub ticker: String,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// Number of recent observations echoed back
    #[serde(default = "default_recent")]
    pub recent: usize,
}

fn default_horizon() -> usize {
    DEFAULT_HORIZON
}

fn default_recent() -> usize {
    DEFAULT_RECENT_ROWS
}

impl PredictRequest {
    pub fn new(ticker: &str, horizon: usize) -> Self {
        Self {
            ticker: ticker.to_string(),
            horizon,
            recent: DEFAULT_RECENT_ROWS,
        }
    }

    pub fn with_recent(mut self, recent: usize) -> Self {
        self.recent = recent;
        self
    }

    pub fn validate(&self) -> Result<()> {
        normalize_series_id(&self.ticker)?;
        if !(MIN_REQUEST_HORIZON..=MAX_REQUEST_HORIZON).contains(&self.horizon) {
            return Err(ForecastError::ValidationError(format!(
                "Horizon {} must be between {} and {}",
                self.horizon, MIN_REQUEST_HORIZON, MAX_REQUEST_HORIZON
            )));
        }
        if !(MIN_RECENT_ROWS..=MAX_RECENT_ROWS).contains(&self.recent) {
            return Err(ForecastError::ValidationError(format!(
                "Recent rows {} must be between {} and {}",
                self.recent, MIN_RECENT_ROWS, MAX_RECENT_ROWS
            )));
        }
        Ok(())
    }
}

/// One echoed historical observation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalPoint {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    pub close: f64,
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
}

/// Serving response handed back to the HTTP layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResponse {
    pub ticker: String,
    pub horizon: usize,
    pub historical: Vec<HistoricalPoint>,
    pub predictions: Vec<StepForecast>,
    /// Validation metrics of the served horizon, keyed `step_{s}`
    pub metrics: BTreeMap<String, StepMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Forecast engine sharing one artifact store
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    store: Arc<ArtifactStore>,
}

impl ForecastEngine {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Forecast `requested_horizon` steps (or the substituted horizon) from a snapshot
    pub fn forecast(
        &self,
        series_id: &str,
        requested_horizon: usize,
        snapshot: &FeatureSnapshot,
    ) -> Result<Forecast> {
        let metadata = self.store.get_metadata(series_id)?;
        let resolution = resolve_horizon(&metadata.horizons(), requested_horizon)?;
        if let Some(note) = &resolution.note {
            log::info!("{}: {}", metadata.ticker, note);
        }

        let bundle = self.store.get_bundle(series_id, Some(resolution.horizon))?;
        let quantiles = &bundle.metadata().quantiles;
        let row = snapshot.ordered(&bundle.metadata().feature_cols)?;
        let dates = future_business_days(snapshot.date, bundle.horizon())?;

        let steps = dates
            .into_iter()
            .enumerate()
            .map(|(index, date)| {
                let step = index + 1;
                let values = quantiles
                    .iter()
                    .map(|&q| Ok((percentile_key(q), bundle.predict(step, q, &row)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(StepForecast { step, date, values })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Forecast {
            ticker: bundle.ticker().to_string(),
            requested_horizon,
            horizon: bundle.horizon(),
            note: resolution.note,
            steps,
        })
    }

    /// Full serving pipeline: fetch, featurize, forecast from the latest
    /// complete row, and echo recent history with the served horizon's metrics
    pub fn predict(
        &self,
        request: &PredictRequest,
        provider: &dyn SeriesProvider,
    ) -> Result<ForecastResponse> {
        request.validate()?;
        let ticker = normalize_series_id(&request.ticker)?;

        let mut observations = provider.fetch(&ticker, DateRange::unbounded())?;
        observations.sort_by_key(|o| o.date);

        let snapshot = transform(&observations)?
            .drop_incomplete()?
            .last_snapshot()?;
        let forecast = self.forecast(&ticker, request.horizon, &snapshot)?;

        let skip = observations.len().saturating_sub(request.recent);
        let historical = observations[skip..]
            .iter()
            .map(|o| HistoricalPoint {
                date: o.date,
                close: o.close,
            })
            .collect();

        let metadata = self.store.get_metadata(&ticker)?;
        let metrics = metadata
            .metrics_for(forecast.horizon)
            .map(|steps| {
                steps
                    .iter()
                    .map(|(step, values)| (step_key(*step), values.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ForecastResponse {
            ticker: forecast.ticker,
            horizon: forecast.horizon,
            historical,
            predictions: forecast.steps,
            metrics,
            note: forecast.note,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_horizon_has_no_note() {
        let resolution = resolve_horizon(&[5, 10, 30], 10).unwrap();
        assert_eq!(resolution.horizon, 10);
        assert!(resolution.note.is_none());
    }

    #[test]
    fn test_smallest_larger_horizon_wins() {
        assert_eq!(resolve_horizon(&[30, 5, 10], 7).unwrap().horizon, 10);
        assert_eq!(resolve_horizon(&[5, 10, 30], 1).unwrap().horizon, 5);
    }

    #[test]
    fn test_falls_back_to_largest() {
        let resolution = resolve_horizon(&[5], 10).unwrap();
        assert_eq!(resolution.horizon, 5);
        assert!(resolution.note.unwrap().contains("10"));
    }

    #[test]
    fn test_empty_trained_set() {
        assert!(resolve_horizon(&[], 5).is_err());
    }

    #[test]
    fn test_step_forecast_serialization() {
        let step = StepForecast {
            step: 1,
            date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            values: vec![(90, 3.0), (10, 1.0)],
        };
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, r#"{"date":"2024-01-08","p90":3.0,"p10":1.0}"#);
        assert_eq!(step.value(0.1), Some(1.0));
    }
}
