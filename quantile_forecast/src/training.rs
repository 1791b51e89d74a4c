//! Offline training of per-(horizon, step, quantile) models
//!
//! The feature frame is computed once and cleaned of undefined rows; each
//! horizon then aligns its own targets from that shared frame, splits
//! chronologically, and fits one model per step and quantile. The metadata
//! record is written last, after every artifact of every horizon.

use crate::config::{TrainingConfig, VALIDATION_FRACTION};
use crate::data::{normalize_series_id, Observation};
use crate::error::{ForecastError, Result};
use crate::features::{transform, FeatureFrame};
use crate::metrics::evaluate_quantile;
use crate::models::{FittedQuantileModel, GradientBoostedQuantile, QuantileRegressor};
use crate::store::{ArtifactKey, ArtifactStore, HorizonMetrics, MetadataRecord};
use crate::utils::split_index;
use chrono::{SubsecRound, Utc};
use std::collections::BTreeMap;

/// Trains model sets into an artifact store
#[derive(Debug)]
pub struct TrainingOrchestrator<'a> {
    store: &'a ArtifactStore,
}

impl<'a> TrainingOrchestrator<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Train every configured horizon for a series and persist the result.
    ///
    /// Any failure aborts the run before the metadata file is touched, so a
    /// previously written record for the series stays in effect.
    pub fn train(
        &self,
        series_id: &str,
        observations: &[Observation],
        config: &TrainingConfig,
    ) -> Result<MetadataRecord> {
        config.validate()?;
        let ticker = normalize_series_id(series_id)?;
        let regressor = GradientBoostedQuantile::new(config.params.clone())?;

        let frame = transform(observations)?.drop_incomplete()?;
        let feature_cols = frame.column_names();
        let horizons = config.sorted_horizons();
        log::info!(
            "Training {} on {} complete rows ({} features), horizons {:?}",
            ticker,
            frame.len(),
            feature_cols.len(),
            horizons
        );

        // Every horizon must be trainable before the first artifact is written
        for &horizon in &horizons {
            horizon_split(frame.len(), horizon)?;
        }

        let mut metrics = BTreeMap::new();
        for &horizon in &horizons {
            log::info!("=== Training horizon {} ===", horizon);
            let horizon_metrics =
                self.train_horizon(&ticker, &frame, horizon, &config.quantiles, &regressor)?;
            metrics.insert(horizon, horizon_metrics);
        }

        let record = MetadataRecord::multi_horizon(
            &ticker,
            horizons,
            config.quantiles.clone(),
            feature_cols,
            metrics,
            Utc::now().trunc_subsecs(0),
            frame.len(),
        )?;
        self.store.write_metadata(&record)?;
        Ok(record)
    }

    fn train_horizon(
        &self,
        ticker: &str,
        frame: &FeatureFrame,
        horizon: usize,
        quantiles: &[f64],
        regressor: &GradientBoostedQuantile,
    ) -> Result<HorizonMetrics> {
        let dataset = frame.align_horizon(horizon)?;
        let n_rows = dataset.features.n_rows();
        let split = horizon_split(frame.len(), horizon)?;

        let x_train = dataset.features.slice_rows(0, split)?;
        let x_val = dataset.features.slice_rows(split, n_rows)?;

        let mut horizon_metrics = HorizonMetrics::new();
        for (index, target) in dataset.targets.iter().enumerate() {
            let step = index + 1;
            let (y_train, y_val) = target.split_at(split);
            let mut step_metrics = BTreeMap::new();

            for &quantile in quantiles {
                let failure = |reason: String| ForecastError::TrainingFailure {
                    horizon,
                    step,
                    quantile,
                    reason,
                };

                let model = regressor
                    .fit(&x_train, y_train, quantile)
                    .map_err(|e| failure(e.to_string()))?;
                let predicted = model.predict(&x_val).map_err(|e| failure(e.to_string()))?;
                let scores = evaluate_quantile(y_val, &predicted, quantile)?;
                scores.record_into(&mut step_metrics);

                self.store
                    .write_artifact(ticker, horizon, ArtifactKey::new(step, quantile), &model)?;
                log::debug!("H{} step {} {}", horizon, step, scores);
            }

            log::info!("H{} step {}/{} metrics: {:?}", horizon, step, horizon, step_metrics);
            horizon_metrics.insert(step, step_metrics);
        }

        Ok(horizon_metrics)
    }
}

/// Train/validation boundary of the rows aligned for `horizon`
fn horizon_split(complete_rows: usize, horizon: usize) -> Result<usize> {
    let aligned = complete_rows.saturating_sub(horizon);
    let split = split_index(aligned, VALIDATION_FRACTION);
    if aligned == 0 || split == 0 || split == aligned {
        return Err(ForecastError::InsufficientData(format!(
            "{} complete rows cannot be split into training and validation sets for horizon {}",
            complete_rows, horizon
        )));
    }
    Ok(split)
}
