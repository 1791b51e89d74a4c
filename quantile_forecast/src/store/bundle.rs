//! Complete in-memory model sets for one resolved horizon

use super::metadata::MetadataRecord;
use crate::config::ARTIFACT_EXTENSION;
use crate::error::{ForecastError, Result};
use crate::models::{FittedQuantileModel, TrainedGradientBoostedQuantile};
use crate::utils::percentile_key;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifies one model inside a horizon: forecast step and quantile percentile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub step: usize,
    pub percentile: u32,
}

impl ArtifactKey {
    pub fn new(step: usize, quantile: f64) -> Self {
        Self {
            step,
            percentile: percentile_key(quantile),
        }
    }

    /// `step_{s}_q{pct}.json`
    pub fn file_name(&self) -> String {
        format!("step_{}_q{}.{}", self.step, self.percentile, ARTIFACT_EXTENSION)
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Every key a complete set for `horizon` must hold, step-major
    pub fn expected(horizon: usize, quantiles: &[f64]) -> Vec<ArtifactKey> {
        (1..=horizon)
            .flat_map(|step| quantiles.iter().map(move |&q| ArtifactKey::new(step, q)))
            .collect()
    }
}

/// Loaded models of one (series, horizon) pair.
///
/// Construction fails unless every (step, quantile) implied by the horizon
/// and the metadata's quantile list is present.
#[derive(Debug)]
pub struct ModelBundle {
    ticker: String,
    horizon: usize,
    metadata: Arc<MetadataRecord>,
    models: HashMap<ArtifactKey, TrainedGradientBoostedQuantile>,
}

impl ModelBundle {
    pub fn new(
        metadata: Arc<MetadataRecord>,
        horizon: usize,
        artifact_dir: &Path,
        models: HashMap<ArtifactKey, TrainedGradientBoostedQuantile>,
    ) -> Result<Self> {
        let expected = ArtifactKey::expected(horizon, &metadata.quantiles);
        if let Some(missing) = expected.iter().find(|key| !models.contains_key(*key)) {
            return Err(ForecastError::MissingArtifact(missing.path_in(artifact_dir)));
        }
        if models.len() != expected.len() {
            return Err(ForecastError::ValidationError(format!(
                "Bundle for horizon {} holds {} models, expected {}",
                horizon,
                models.len(),
                expected.len()
            )));
        }

        Ok(Self {
            ticker: metadata.ticker.clone(),
            horizon,
            metadata,
            models,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn metadata(&self) -> &MetadataRecord {
        &self.metadata
    }

    /// Number of loaded models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model(&self, step: usize, quantile: f64) -> Option<&TrainedGradientBoostedQuantile> {
        self.models.get(&ArtifactKey::new(step, quantile))
    }

    /// Predict the `quantile` of the value `step` periods ahead from one row
    pub fn predict(&self, step: usize, quantile: f64, row: &[f64]) -> Result<f64> {
        let key = ArtifactKey::new(step, quantile);
        let model = self.models.get(&key).ok_or_else(|| {
            ForecastError::ValidationError(format!(
                "No model for step {} q{} in horizon {}",
                key.step, key.percentile, self.horizon
            ))
        })?;
        model.predict_row(row)
    }
}
