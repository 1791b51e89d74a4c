mod common;

use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate, Weekday};
use common::{business_day_series, fast_params, temp_store, write_h5_fixture, write_legacy_fixture};
use pretty_assertions::assert_eq;
use quantile_forecast::config::TrainingConfig;
use quantile_forecast::data::InMemorySeriesProvider;
use quantile_forecast::engine::{ForecastEngine, PredictRequest};
use quantile_forecast::features::FeatureSnapshot;
use quantile_forecast::{ForecastError, TrainingOrchestrator};
use rstest::rstest;
use std::sync::Arc;

fn close_snapshot(date: NaiveDate) -> FeatureSnapshot {
    FeatureSnapshot {
        date,
        columns: vec!["close".to_string()],
        values: vec![100.0],
    }
}

fn friday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
}

#[test]
fn test_engine_substitutes_where_store_refuses() {
    let (dir, store) = temp_store();
    write_h5_fixture(dir.path(), "TEST");
    let store = Arc::new(store);

    // Store: strict lookup
    assert!(store.get_bundle("TEST", Some(10)).unwrap_err().is_caller_error());

    // Engine: falls back to the only trained horizon with a note
    let engine = ForecastEngine::new(Arc::clone(&store));
    let forecast = engine.forecast("TEST", 10, &close_snapshot(friday())).unwrap();
    assert_eq!(forecast.requested_horizon, 10);
    assert_eq!(forecast.horizon, 5);
    assert_eq!(forecast.steps.len(), 5);
    assert!(forecast.note.unwrap().contains("using 5"));
}

#[rstest]
#[case(30, 30, false)]
#[case(15, 30, true)]
#[case(60, 30, true)]
fn test_legacy_record_resolution(
    #[case] requested: usize,
    #[case] served: usize,
    #[case] has_note: bool,
) {
    let (dir, store) = temp_store();
    write_legacy_fixture(dir.path(), "OLD");
    let engine = ForecastEngine::new(Arc::new(store));

    let forecast = engine.forecast("OLD", requested, &close_snapshot(friday())).unwrap();
    assert_eq!(forecast.horizon, served);
    assert_eq!(forecast.note.is_some(), has_note);
    assert_eq!(forecast.steps.len(), served);
}

#[test]
fn test_steps_are_ordered_business_days() {
    let (dir, store) = temp_store();
    write_h5_fixture(dir.path(), "TEST");
    let engine = ForecastEngine::new(Arc::new(store));

    let forecast = engine.forecast("TEST", 5, &close_snapshot(friday())).unwrap();
    let dates: Vec<NaiveDate> = forecast.steps.iter().map(|s| s.date).collect();

    assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
    assert!(dates
        .iter()
        .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
    let steps: Vec<usize> = forecast.steps.iter().map(|s| s.step).collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_quantiles_follow_metadata_order() {
    let (dir, store) = temp_store();
    let metadata = serde_json::json!({
        "ticker": "ORD",
        "horizons": [2],
        "quantiles": [0.9, 0.1, 0.5],
        "feature_cols": ["close"],
        "trained_at": "2024-01-01T00:00:00Z",
        "rows": 10
    });
    common::write_fixture(dir.path(), "ORD", metadata, &[(2, "H2")]);
    let engine = ForecastEngine::new(Arc::new(store));

    let forecast = engine.forecast("ORD", 2, &close_snapshot(friday())).unwrap();
    let percentiles: Vec<u32> = forecast.steps[0].values.iter().map(|(p, _)| *p).collect();
    assert_eq!(percentiles, vec![90, 10, 50]);
    assert_relative_eq!(forecast.steps[1].value(0.9).unwrap(), 102.9, epsilon = 1e-9);
}

#[test]
fn test_snapshot_missing_training_column() {
    let (dir, store) = temp_store();
    write_h5_fixture(dir.path(), "TEST");
    let engine = ForecastEngine::new(Arc::new(store));

    let snapshot = FeatureSnapshot {
        date: friday(),
        columns: vec!["open".to_string()],
        values: vec![1.0],
    };
    assert!(matches!(
        engine.forecast("TEST", 5, &snapshot),
        Err(ForecastError::DataError(_))
    ));
}

#[test]
fn test_unknown_series() {
    let (_dir, store) = temp_store();
    let engine = ForecastEngine::new(Arc::new(store));
    assert!(engine
        .forecast("NONE", 5, &close_snapshot(friday()))
        .unwrap_err()
        .is_not_found());
}

#[test]
fn test_predict_pipeline() {
    // 1. Train horizons 3 and 6
    let (_dir, store) = temp_store();
    let observations = business_day_series(150, 11);
    let config = TrainingConfig::new(vec![3, 6], vec![0.1, 0.5, 0.9], fast_params()).unwrap();
    TrainingOrchestrator::new(&store)
        .train("SYN", &observations, &config)
        .unwrap();

    // 2. Serve an untrained horizon through the full pipeline
    let mut provider = InMemorySeriesProvider::new();
    provider.insert("syn", observations.clone()).unwrap();
    let engine = ForecastEngine::new(Arc::new(store));
    let request = PredictRequest::new("syn", 4).with_recent(50);
    let response = engine.predict(&request, &provider).unwrap();

    assert_eq!(response.ticker, "SYN");
    assert_eq!(response.horizon, 6);
    assert!(response.note.is_some());
    assert_eq!(response.predictions.len(), 6);
    assert_eq!(response.historical.len(), 50);
    assert_eq!(response.historical.last().unwrap().date, observations[149].date);
    assert_eq!(response.metrics.len(), 6);
    assert!(response.metrics["step_6"].contains_key("q90_pinball"));
    assert!(response.predictions[0].date > observations[149].date);

    // 3. Serialized shape for the HTTP layer
    let json = serde_json::to_value(&response).unwrap();
    assert!(json["predictions"][0]["p50"].is_number());
    assert!(json["predictions"][0]["date"].is_string());
    assert!(json["note"].is_string());
}

#[test]
fn test_exact_horizon_response_has_no_note() {
    let (_dir, store) = temp_store();
    let observations = business_day_series(120, 12);
    let config = TrainingConfig::new(vec![2], vec![0.5], fast_params()).unwrap();
    TrainingOrchestrator::new(&store)
        .train("EX", &observations, &config)
        .unwrap();

    let mut provider = InMemorySeriesProvider::new();
    provider.insert("EX", observations).unwrap();
    let engine = ForecastEngine::new(Arc::new(store));
    let response = engine
        .predict(&PredictRequest::new("EX", 2), &provider)
        .unwrap();

    assert!(response.note.is_none());
    assert_eq!(response.historical.len(), 120);
    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("note").is_none());
}

#[test]
fn test_gap_in_volume_history_still_serves() {
    let (_dir, store) = temp_store();
    let observations = business_day_series(150, 13);
    let config = TrainingConfig::new(vec![3], vec![0.5], fast_params()).unwrap();
    TrainingOrchestrator::new(&store)
        .train("GAP", &observations, &config)
        .unwrap();

    // One old row without volume only removes that row from the frame
    let mut served = observations.clone();
    served[5].volume = None;
    let mut provider = InMemorySeriesProvider::new();
    provider.insert("GAP", served).unwrap();

    let engine = ForecastEngine::new(Arc::new(store));
    let response = engine
        .predict(&PredictRequest::new("GAP", 3), &provider)
        .unwrap();

    assert_eq!(response.horizon, 3);
    assert_eq!(response.predictions.len(), 3);
    assert!(response.predictions[0].date > observations[149].date);
}

#[rstest]
#[case(0, 200)]
#[case(366, 200)]
#[case(30, 49)]
#[case(30, 2001)]
fn test_request_bounds(#[case] horizon: usize, #[case] recent: usize) {
    let request = PredictRequest::new("AAPL", horizon).with_recent(recent);
    assert!(request.validate().unwrap_err().is_caller_error());
}

#[test]
fn test_request_defaults() {
    let request: PredictRequest = serde_json::from_str(r#"{"ticker": "AAPL"}"#).unwrap();
    assert_eq!(request.horizon, 30);
    assert_eq!(request.recent, 200);
    assert!(request.validate().is_ok());
}
