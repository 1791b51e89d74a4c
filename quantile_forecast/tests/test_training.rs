mod common;

use approx::assert_relative_eq;
use common::{business_day_series, fast_params, temp_store};
use pretty_assertions::assert_eq;
use quantile_forecast::config::TrainingConfig;
use quantile_forecast::data::Observation;
use quantile_forecast::store::ArtifactStore;
use quantile_forecast::{ForecastError, TrainingOrchestrator};

fn config(horizons: Vec<usize>) -> TrainingConfig {
    TrainingConfig::new(horizons, vec![0.1, 0.5, 0.9], fast_params()).unwrap()
}

#[test]
fn test_single_horizon_scenario() {
    // 1. Train 120 business days for horizon 5
    let (dir, store) = temp_store();
    let observations = business_day_series(120, 1);
    let record = TrainingOrchestrator::new(&store)
        .train("abc", &observations, &config(vec![5]))
        .unwrap();

    // 2. The bundle holds one model per step and quantile
    let bundle = store.get_bundle("ABC", Some(5)).unwrap();
    assert_eq!(bundle.len(), 15);
    assert!(dir.path().join("ABC/H5/step_5_q90.json").exists());

    // 3. Metrics: five steps with two scores per quantile
    let metrics = record.metrics_for(5).unwrap();
    assert_eq!(metrics.len(), 5);
    for step_metrics in metrics.values() {
        assert_eq!(step_metrics.len(), 6);
        assert!(step_metrics.values().all(|v| v.is_finite() && *v >= 0.0));
    }
    let keys: Vec<&str> = metrics[&1].keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["q10_mae", "q10_pinball", "q50_mae", "q50_pinball", "q90_mae", "q90_pinball"]
    );

    // 4. Every row before the longest lookback is dropped
    assert_eq!(record.rows, 90);
    assert_eq!(record.default_horizon(), 5);
}

#[test]
fn test_metadata_round_trip() {
    let (dir, store) = temp_store();
    let observations = business_day_series(130, 2);
    let record = TrainingOrchestrator::new(&store)
        .train("RT", &observations, &config(vec![3, 2]))
        .unwrap();

    // A fresh store reads the file rather than a cache
    let reader = ArtifactStore::open(dir.path()).unwrap();
    let loaded = reader.get_metadata("RT").unwrap();

    assert_eq!(loaded.feature_cols, record.feature_cols);
    assert_eq!(loaded.quantiles, record.quantiles);
    assert_eq!(loaded.horizons(), vec![2, 3]);
    assert_eq!(loaded.default_horizon(), 3);
    assert_eq!(loaded.trained_at, record.trained_at);
    assert_eq!(loaded.rows, record.rows);
    for (horizon, steps) in &record.metrics {
        for (step, values) in steps {
            for (key, value) in values {
                assert_relative_eq!(loaded.metrics[horizon][step][key], *value, max_relative = 1e-12);
            }
        }
    }

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("RT/metadata.json")).unwrap())
            .unwrap();
    assert_eq!(raw["horizons"], serde_json::json!([2, 3]));
    assert!(raw.get("horizon").is_none());
    assert!(raw["metrics"]["H2"]["step_2"]["q50_pinball"].is_number());
}

#[test]
fn test_feature_columns_recorded_in_frame_order() {
    let (_dir, store) = temp_store();
    let record = TrainingOrchestrator::new(&store)
        .train("COLS", &business_day_series(100, 3), &config(vec![1]))
        .unwrap();

    assert_eq!(&record.feature_cols[..5], &["open", "high", "low", "close", "volume"]);
    assert_eq!(record.feature_cols.last().map(String::as_str), Some("month"));
    assert!(!record.feature_cols.iter().any(|c| c == "date"));
}

#[test]
fn test_insufficient_data_fails_fast() {
    let (dir, store) = temp_store();
    let err = TrainingOrchestrator::new(&store)
        .train("SHORT", &business_day_series(33, 4), &config(vec![5]))
        .unwrap_err();

    assert!(matches!(err, ForecastError::InsufficientData(_)));
    assert!(!dir.path().join("SHORT").exists());
}

#[test]
fn test_fit_failure_aborts_without_metadata() {
    let (dir, store) = temp_store();
    let mut observations = business_day_series(100, 5);
    // a zero close makes the next return infinite
    observations[40].close = 0.0;

    let err = TrainingOrchestrator::new(&store)
        .train("BAD", &observations, &config(vec![2]))
        .unwrap_err();

    match err {
        ForecastError::TrainingFailure { horizon, step, .. } => {
            assert_eq!(horizon, 2);
            assert_eq!(step, 1);
        }
        other => panic!("Expected TrainingFailure, got {:?}", other),
    }
    assert!(!dir.path().join("BAD/metadata.json").exists());
    assert!(store.get_metadata("BAD").unwrap_err().is_not_found());
}

#[test]
fn test_retraining_replaces_record() {
    let (_dir, store) = temp_store();
    let observations = business_day_series(110, 6);
    let orchestrator = TrainingOrchestrator::new(&store);

    orchestrator.train("RE", &observations, &config(vec![2])).unwrap();
    orchestrator.train("RE", &observations, &config(vec![1, 3])).unwrap();

    let reader = ArtifactStore::open(store.models_dir()).unwrap();
    assert_eq!(reader.get_metadata("RE").unwrap().horizons(), vec![1, 3]);
}

#[test]
fn test_failed_retrain_leaves_existing_models_servable() {
    let (dir, store) = temp_store();
    let observations = business_day_series(150, 7);
    let orchestrator = TrainingOrchestrator::new(&store);
    orchestrator.train("KEEP", &observations, &config(vec![5])).unwrap();

    let artifact = dir.path().join("KEEP/H5/step_1_q50.json");
    let before = std::fs::read_to_string(&artifact).unwrap();

    // Close-only retrain with one horizon far beyond the available rows
    let close_only: Vec<Observation> = observations
        .iter()
        .map(|o| Observation::new(o.date, o.close))
        .collect();
    let err = orchestrator
        .train("KEEP", &close_only, &config(vec![5, 500]))
        .unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData(_)));

    assert_eq!(std::fs::read_to_string(&artifact).unwrap(), before);
    let reader = ArtifactStore::open(dir.path()).unwrap();
    assert_eq!(reader.get_bundle("KEEP", Some(5)).unwrap().len(), 15);
}
