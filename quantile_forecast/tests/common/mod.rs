#![allow(dead_code)]

use chrono::{Datelike, Days, NaiveDate, Weekday};
use quantile_forecast::config::StoreConfig;
use quantile_forecast::data::Observation;
use quantile_forecast::models::GbmParams;
use quantile_forecast::store::ArtifactStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Seeded random walk on consecutive business days starting Monday 2023-01-02
pub fn business_day_series(n: usize, seed: u64) -> Vec<Observation> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let mut date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let mut close = 100.0;

    let mut observations = Vec::with_capacity(n);
    while observations.len() < n {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            close += noise.sample(&mut rng) * 0.5;
            observations.push(Observation::ohlcv(
                date,
                close + noise.sample(&mut rng) * 0.2,
                close + rng.gen::<f64>(),
                close - rng.gen::<f64>(),
                close,
                rng.gen_range(200_000.0..1_000_000.0),
            ));
        }
        date = date.checked_add_days(Days::new(1)).unwrap();
    }
    observations
}

/// Small boosting setup so integration tests stay quick
pub fn fast_params() -> GbmParams {
    GbmParams {
        n_estimators: 10,
        max_depth: 3,
        min_samples_leaf: 5,
        max_bins: 16,
        ..GbmParams::default()
    }
}

pub fn temp_store() -> (TempDir, ArtifactStore) {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::new(StoreConfig::new(dir.path())).unwrap();
    (dir, store)
}

/// Model artifact that always predicts `value`
pub fn constant_artifact(quantile: f64, n_features: usize, value: f64) -> String {
    serde_json::json!({
        "name": "constant",
        "quantile": quantile,
        "n_features": n_features,
        "base_score": value,
        "learning_rate": 0.1,
        "trees": []
    })
    .to_string()
}

/// Hand-written metadata file plus a complete set of constant artifacts.
///
/// `artifact_dirs` maps each horizon to the directory (relative to the
/// series directory) its artifacts are written to.
pub fn write_fixture(
    models_dir: &Path,
    ticker: &str,
    metadata: serde_json::Value,
    artifact_dirs: &[(usize, &str)],
) {
    let series_dir = models_dir.join(ticker);
    fs::create_dir_all(&series_dir).unwrap();
    fs::write(series_dir.join("metadata.json"), metadata.to_string()).unwrap();

    let quantiles: Vec<f64> = metadata["quantiles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q.as_f64().unwrap())
        .collect();
    let n_features = metadata["feature_cols"].as_array().unwrap().len();

    for &(horizon, sub_dir) in artifact_dirs {
        let dir = series_dir.join(sub_dir);
        fs::create_dir_all(&dir).unwrap();
        for step in 1..=horizon {
            for &q in &quantiles {
                let name = format!("step_{}_q{}.json", step, (q * 100.0).round() as u32);
                let value = 100.0 + step as f64 + q;
                fs::write(dir.join(name), constant_artifact(q, n_features, value)).unwrap();
            }
        }
    }
}

/// Legacy record trained for a single horizon of 30 on one feature column
pub fn write_legacy_fixture(models_dir: &Path, ticker: &str) {
    let metadata = serde_json::json!({
        "ticker": ticker,
        "horizon": 30,
        "quantiles": [0.1, 0.5, 0.9],
        "feature_cols": ["close"],
        "metrics": {"step_1": {"q10_mae": 1.5, "q10_pinball": 0.3}},
        "trained_at": "2024-01-01T00:00:00Z",
        "rows": 500
    });
    write_fixture(models_dir, ticker, metadata, &[(30, "")]);
}

/// Multi-horizon record trained only for horizon 5 on one feature column
pub fn write_h5_fixture(models_dir: &Path, ticker: &str) {
    let metadata = serde_json::json!({
        "ticker": ticker,
        "horizons": [5],
        "default_horizon": 5,
        "quantiles": [0.1, 0.5, 0.9],
        "feature_cols": ["close"],
        "metrics": {"H5": {}},
        "trained_at": "2024-01-01T00:00:00Z",
        "rows": 10
    });
    write_fixture(models_dir, ticker, metadata, &[(5, "H5")]);
}
