use approx::assert_relative_eq;
use quantile_forecast::metrics::{evaluate_quantile, mean_absolute_error, pinball_loss};
use quantile_forecast::ForecastError;
use rstest::rstest;
use std::collections::BTreeMap;

#[test]
fn test_regression_metrics() {
    let actual = vec![10.0, 20.0, 30.0, 40.0, 50.0];
    let predicted = vec![12.0, 18.0, 33.0, 37.0, 52.0];

    // Test MAE
    let mae = mean_absolute_error(&actual, &predicted).unwrap();
    assert_relative_eq!(mae, 2.4, epsilon = 1e-12);

    // Test pinball at the median
    let pinball = pinball_loss(&actual, &predicted, 0.5).unwrap();
    assert_relative_eq!(pinball, mae / 2.0, epsilon = 1e-12);
}

#[test]
fn test_perfect_predictions() {
    let values = vec![1.0, 2.0, 3.0];
    assert_eq!(mean_absolute_error(&values, &values).unwrap(), 0.0);
    assert_eq!(pinball_loss(&values, &values, 0.5).unwrap(), 0.0);
}

#[rstest]
#[case(0.1)]
#[case(0.5)]
#[case(0.9)]
fn test_pinball_non_negative(#[case] quantile: f64) {
    let actual = vec![3.0, -1.0, 4.0, 1.0, -5.0];
    let predicted = vec![2.5, 0.0, 6.0, 1.0, -2.0];
    assert!(pinball_loss(&actual, &predicted, quantile).unwrap() >= 0.0);
}

#[test]
fn test_pinball_penalises_wrong_side() {
    // A high quantile forecast that sits below the data costs more than one above it
    let actual = vec![10.0; 4];
    let below = pinball_loss(&actual, &[8.0; 4], 0.9).unwrap();
    let above = pinball_loss(&actual, &[12.0; 4], 0.9).unwrap();
    assert!(below > above);
    assert_relative_eq!(below, 1.8, epsilon = 1e-12);
    assert_relative_eq!(above, 0.2, epsilon = 1e-12);
}

#[test]
fn test_error_handling() {
    // Test with empty vectors
    let empty: Vec<f64> = vec![];
    assert!(matches!(
        mean_absolute_error(&empty, &empty),
        Err(ForecastError::ValidationError(_))
    ));

    // Test with mismatched lengths
    let actual = vec![1.0, 2.0, 3.0];
    let predicted = vec![1.0, 2.0];
    assert!(pinball_loss(&actual, &predicted, 0.5).is_err());

    // Quantile outside (0, 1)
    assert!(pinball_loss(&actual, &actual, 1.5).is_err());
}

#[test]
fn test_evaluate_quantile_entries() {
    let metrics = evaluate_quantile(&[1.0, 2.0, 3.0], &[1.0, 2.5, 2.0], 0.9).unwrap();
    let mut step = BTreeMap::new();
    metrics.record_into(&mut step);

    let keys: Vec<&String> = step.keys().collect();
    assert_eq!(keys, vec!["q90_mae", "q90_pinball"]);
    assert_relative_eq!(step["q90_mae"], 0.5, epsilon = 1e-12);
    assert!(metrics.to_string().starts_with("q90:"));
}
