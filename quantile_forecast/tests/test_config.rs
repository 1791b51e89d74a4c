use pretty_assertions::assert_eq;
use quantile_forecast::config::{StoreConfig, TrainingConfig, DEFAULT_BUNDLE_CAPACITY};
use quantile_forecast::ForecastError;
use std::io::Write;
use tempfile::NamedTempFile;

fn json_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_training_config_from_file() {
    let file = json_file(
        r#"{"horizons": [10, 5], "quantiles": [0.05, 0.5, 0.95], "params": {"n_estimators": 50}}"#,
    );
    let config = TrainingConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config.sorted_horizons(), vec![5, 10]);
    assert_eq!(config.quantiles, vec![0.05, 0.5, 0.95]);
    assert_eq!(config.params.n_estimators, 50);
    assert_eq!(config.params.learning_rate, 0.05);
}

#[test]
fn test_training_config_file_validated() {
    let file = json_file(r#"{"horizons": [0]}"#);
    assert!(matches!(
        TrainingConfig::from_json_file(file.path()),
        Err(ForecastError::InvalidParameter(_))
    ));

    let file = json_file(r#"{"quantiles": [0.5, 1.2]}"#);
    assert!(TrainingConfig::from_json_file(file.path()).is_err());
}

#[test]
fn test_store_config_from_file() {
    let file = json_file(r#"{"models_dir": "/srv/models", "metadata_capacity": 4}"#);
    let config = StoreConfig::from_json_file(file.path()).unwrap();

    assert_eq!(config.models_dir.to_str(), Some("/srv/models"));
    assert_eq!(config.metadata_capacity, 4);
    assert_eq!(config.bundle_capacity, DEFAULT_BUNDLE_CAPACITY);
}

#[test]
fn test_missing_config_file() {
    assert!(matches!(
        StoreConfig::from_json_file("/nonexistent/store.json"),
        Err(ForecastError::IoError(_))
    ));
}
