//! Directory-addressed registry of metadata records and model artifacts
//!
//! ```text
//! {models_dir}/{SERIES_ID}/metadata.json
//! {models_dir}/{SERIES_ID}/H{h}/step_{s}_q{pct}.json   multi-horizon
//! {models_dir}/{SERIES_ID}/step_{s}_q{pct}.json        legacy
//! ```
//!
//! Lookups are strict: a horizon that was never trained is a caller error.
//! Parsed records and loaded bundles are kept in bounded LRU caches that are
//! filled on first access and never refreshed by writes.

pub mod bundle;
pub mod metadata;

pub use bundle::{ArtifactKey, ModelBundle};
pub use metadata::{HorizonLayout, HorizonMetrics, MetadataRecord, ModelSummary, StepMetrics};

use crate::config::{StoreConfig, METADATA_FILE};
use crate::data::normalize_series_id;
use crate::error::{ForecastError, Result};
use crate::models::{FittedQuantileModel, TrainedGradientBoostedQuantile};
use crate::utils::percentile_key;
use lru::LruCache;
use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

type BundleKey = (String, usize);

/// Artifact registry owning the metadata and bundle caches
#[derive(Debug)]
pub struct ArtifactStore {
    config: StoreConfig,
    metadata_cache: Mutex<LruCache<String, Arc<MetadataRecord>>>,
    bundle_cache: Mutex<LruCache<BundleKey, Arc<ModelBundle>>>,
}

fn capacity(value: usize, what: &str) -> Result<NonZeroUsize> {
    NonZeroUsize::new(value).ok_or_else(|| {
        ForecastError::InvalidParameter(format!("{} cache capacity must be greater than zero", what))
    })
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|e| ForecastError::DataError(format!("Failed to acquire {} lock: {}", what, e)))
}

impl ArtifactStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let metadata_cache = LruCache::new(capacity(config.metadata_capacity, "Metadata")?);
        let bundle_cache = LruCache::new(capacity(config.bundle_capacity, "Bundle")?);

        Ok(Self {
            config,
            metadata_cache: Mutex::new(metadata_cache),
            bundle_cache: Mutex::new(bundle_cache),
        })
    }

    /// Store rooted at `models_dir` with default cache capacities
    pub fn open<P: AsRef<Path>>(models_dir: P) -> Result<Self> {
        Self::new(StoreConfig::new(models_dir))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn models_dir(&self) -> &Path {
        &self.config.models_dir
    }

    /// Directory of one series
    pub fn series_dir(&self, series_id: &str) -> Result<PathBuf> {
        Ok(self.config.models_dir.join(normalize_series_id(series_id)?))
    }

    /// Metadata record of a series, parsed once and then served from cache
    pub fn get_metadata(&self, series_id: &str) -> Result<Arc<MetadataRecord>> {
        let id = normalize_series_id(series_id)?;
        if let Some(record) = lock(&self.metadata_cache, "metadata cache")?.get(&id) {
            log::debug!("Metadata cache hit for {}", id);
            return Ok(Arc::clone(record));
        }

        let path = self.config.models_dir.join(&id).join(METADATA_FILE);
        if !path.exists() {
            return Err(ForecastError::NotFound(id));
        }
        let record: MetadataRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let record = Arc::new(record);
        log::debug!("Loaded metadata for {} from {}", id, path.display());

        lock(&self.metadata_cache, "metadata cache")?.put(id, Arc::clone(&record));
        Ok(record)
    }

    /// Complete model set for a trained horizon, or the default one for `None`.
    ///
    /// Untrained horizons are `HorizonUnavailable`; any absent artifact is
    /// `MissingArtifact` and nothing is cached.
    pub fn get_bundle(&self, series_id: &str, horizon: Option<usize>) -> Result<Arc<ModelBundle>> {
        let metadata = self.get_metadata(series_id)?;
        let resolved = metadata.resolve(horizon)?;
        let key = (normalize_series_id(series_id)?, resolved);

        if let Some(bundle) = lock(&self.bundle_cache, "bundle cache")?.get(&key) {
            log::debug!("Bundle cache hit for {} H{}", key.0, resolved);
            return Ok(Arc::clone(bundle));
        }

        let series_dir = self.series_dir(series_id)?;
        let bundle = Arc::new(self.load_bundle(metadata, &series_dir, resolved)?);
        log::info!(
            "Loaded {} models for {} H{}",
            bundle.len(),
            bundle.ticker(),
            resolved
        );

        lock(&self.bundle_cache, "bundle cache")?.put(key, Arc::clone(&bundle));
        Ok(bundle)
    }

    fn load_bundle(
        &self,
        metadata: Arc<MetadataRecord>,
        series_dir: &Path,
        horizon: usize,
    ) -> Result<ModelBundle> {
        let dir = metadata.artifact_dir(series_dir, horizon);
        let n_features = metadata.feature_cols.len();

        let mut models = HashMap::new();
        for key in ArtifactKey::expected(horizon, &metadata.quantiles) {
            let path = key.path_in(&dir);
            if !path.exists() {
                return Err(ForecastError::MissingArtifact(path));
            }

            let model: TrainedGradientBoostedQuantile =
                serde_json::from_str(&fs::read_to_string(&path)?)?;
            model.validate()?;
            if percentile_key(model.quantile()) != key.percentile {
                return Err(ForecastError::DataError(format!(
                    "Artifact {} was fitted for a different quantile",
                    path.display()
                )));
            }
            if model.n_features() != n_features {
                return Err(ForecastError::DataError(format!(
                    "Artifact {} expects {} features, metadata lists {}",
                    path.display(),
                    model.n_features(),
                    n_features
                )));
            }
            models.insert(key, model);
        }

        ModelBundle::new(metadata, horizon, &dir, models)
    }

    /// True when the series has metadata listing every one of `horizons`
    pub fn has_horizons(&self, series_id: &str, horizons: &[usize]) -> Result<bool> {
        match self.get_metadata(series_id) {
            Ok(metadata) => Ok(horizons.iter().all(|&h| metadata.has_horizon(h))),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Summaries of every series directory with a readable metadata file.
    ///
    /// Reads files directly and leaves the caches untouched.
    pub fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let dir = &self.config.models_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path().join(METADATA_FILE);
            if !path.is_file() {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(ForecastError::from)
                .and_then(|text| Ok(serde_json::from_str::<MetadataRecord>(&text)?));
            match parsed {
                Ok(record) => summaries.push(record.summary()),
                Err(e) => log::warn!("Skipping unreadable metadata {}: {}", path.display(), e),
            }
        }

        summaries.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(summaries)
    }

    /// Write one fitted model under `H{horizon}/`
    pub fn write_artifact(
        &self,
        series_id: &str,
        horizon: usize,
        key: ArtifactKey,
        model: &TrainedGradientBoostedQuantile,
    ) -> Result<PathBuf> {
        let dir = self
            .series_dir(series_id)?
            .join(metadata::horizon_key(horizon));
        fs::create_dir_all(&dir)?;

        let path = key.path_in(&dir);
        fs::write(&path, serde_json::to_vec(model)?)?;
        Ok(path)
    }

    /// Replace a series' metadata file through a temporary file and rename
    pub fn write_metadata(&self, record: &MetadataRecord) -> Result<PathBuf> {
        let dir = self.series_dir(&record.ticker)?;
        fs::create_dir_all(&dir)?;

        let path = dir.join(METADATA_FILE);
        let tmp = dir.join(format!("{}.tmp", METADATA_FILE));
        fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        fs::rename(&tmp, &path)?;
        log::info!("Saved metadata for {} to {}", record.ticker, path.display());
        Ok(path)
    }

    /// Number of cached metadata records
    pub fn cached_metadata(&self) -> usize {
        self.metadata_cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Number of cached bundles
    pub fn cached_bundles(&self) -> usize {
        self.bundle_cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}
