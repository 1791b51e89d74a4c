//! Metrics for evaluating quantile forecasts

use crate::error::{ForecastError, Result};
use crate::utils::percentile_key;
use std::collections::BTreeMap;

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::ValidationError(
            "Actual and predicted values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Mean Absolute Error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;

    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Pinball (quantile) loss: `mean(max(q * d, (q - 1) * d))` with `d = actual - predicted`
pub fn pinball_loss(actual: &[f64], predicted: &[f64], quantile: f64) -> Result<f64> {
    check_lengths(actual, predicted)?;
    if !(quantile > 0.0 && quantile < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Quantile {} must be between 0 and 1",
            quantile
        )));
    }

    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let diff = a - p;
            (quantile * diff).max((quantile - 1.0) * diff)
        })
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Validation scores of one (step, quantile) model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileMetrics {
    pub quantile: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Pinball loss at `quantile`
    pub pinball: f64,
}

impl QuantileMetrics {
    /// Metric-name / value pairs as recorded in metadata (`q10_mae`, `q10_pinball`)
    pub fn entries(&self) -> [(String, f64); 2] {
        let prefix = format!("q{}", percentile_key(self.quantile));
        [
            (format!("{}_mae", prefix), self.mae),
            (format!("{}_pinball", prefix), self.pinball),
        ]
    }

    /// Insert both entries into a step's metric map
    pub fn record_into(&self, step_metrics: &mut BTreeMap<String, f64>) {
        for (key, value) in self.entries() {
            step_metrics.insert(key, value);
        }
    }
}

impl std::fmt::Display for QuantileMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "q{}: MAE {:.4}, pinball {:.4}",
            percentile_key(self.quantile),
            self.mae,
            self.pinball
        )
    }
}

/// Score predictions of the `quantile` model against actual values
pub fn evaluate_quantile(actual: &[f64], predicted: &[f64], quantile: f64) -> Result<QuantileMetrics> {
    Ok(QuantileMetrics {
        quantile,
        mae: mean_absolute_error(actual, predicted)?,
        pinball: pinball_loss(actual, predicted, quantile)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinball_asymmetry() {
        // under-prediction costs q per unit, over-prediction (1 - q)
        assert!((pinball_loss(&[10.0], &[8.0], 0.9).unwrap() - 1.8).abs() < 1e-12);
        assert!((pinball_loss(&[10.0], &[12.0], 0.9).unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_metric_keys() {
        let metrics = evaluate_quantile(&[1.0, 2.0], &[1.5, 2.5], 0.1).unwrap();
        let mut map = BTreeMap::new();
        metrics.record_into(&mut map);

        assert_eq!(map.len(), 2);
        assert!((map["q10_mae"] - 0.5).abs() < 1e-12);
        assert!(map.contains_key("q10_pinball"));
    }
}
