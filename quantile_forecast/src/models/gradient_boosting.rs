//! Gradient-boosted regression trees with the quantile (pinball) objective
//!
//! Each boosting round fits a histogram tree to the sign gradient of the
//! pinball loss, then replaces every leaf value with the target quantile of
//! the residuals that reach it. Rows and features are subsampled per round
//! from a seeded generator, so a fit is reproducible for a fixed seed.

use super::tree::{FeatureBins, RegressionTree, TreeBuilder};
use super::{FittedQuantileModel, QuantileRegressor};
use crate::error::{ForecastError, Result};
use crate::features::FeatureMatrix;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};

/// Boosting hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    pub learning_rate: f64,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Share of features considered per round
    pub feature_fraction: f64,
    /// Share of rows sampled per round
    pub bagging_fraction: f64,
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            n_estimators: 200,
            max_depth: 4,
            min_samples_leaf: 20,
            feature_fraction: 0.9,
            bagging_fraction: 0.9,
            max_bins: 64,
            seed: 42,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "Learning rate must be positive".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators must be greater than zero".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_depth must be greater than zero".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_leaf must be greater than zero".to_string(),
            ));
        }
        for (name, fraction) in [
            ("feature_fraction", self.feature_fraction),
            ("bagging_fraction", self.bagging_fraction),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be in (0, 1]",
                    name
                )));
            }
        }
        if self.max_bins < 2 || self.max_bins > u16::MAX as usize {
            return Err(ForecastError::InvalidParameter(format!(
                "max_bins must be between 2 and {}",
                u16::MAX
            )));
        }
        Ok(())
    }
}

/// Gradient-boosted quantile regressor
#[derive(Debug, Clone)]
pub struct GradientBoostedQuantile {
    name: String,
    params: GbmParams,
}

/// Fitted boosting ensemble for one quantile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedGradientBoostedQuantile {
    name: String,
    quantile: f64,
    n_features: usize,
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedQuantile {
    /// Create a new regressor with validated parameters
    pub fn new(params: GbmParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            name: format!(
                "Quantile GBM (rounds={}, lr={}, depth={})",
                params.n_estimators, params.learning_rate, params.max_depth
            ),
            params,
        })
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }
}

fn quantile_of(values: Vec<f64>, quantile: f64) -> f64 {
    Data::new(values).quantile(quantile)
}

fn sample_size(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction).ceil() as usize).clamp(1, total)
}

impl QuantileRegressor for GradientBoostedQuantile {
    type Fitted = TrainedGradientBoostedQuantile;

    fn fit(&self, x: &FeatureMatrix, y: &[f64], quantile: f64) -> Result<Self::Fitted> {
        if !(quantile > 0.0 && quantile < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Quantile {} must be between 0 and 1",
                quantile
            )));
        }
        if x.n_rows() == 0 {
            return Err(ForecastError::InsufficientData(
                "Cannot fit a model on zero rows".to_string(),
            ));
        }
        if x.n_cols() == 0 {
            return Err(ForecastError::InsufficientData(
                "Cannot fit a model without features".to_string(),
            ));
        }
        if x.n_rows() != y.len() {
            return Err(ForecastError::ValidationError(format!(
                "Feature rows ({}) don't match targets ({})",
                x.n_rows(),
                y.len()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(
                "Targets contain non-finite values".to_string(),
            ));
        }
        if x.rows().flatten().any(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(
                "Features contain non-finite values".to_string(),
            ));
        }

        let n_rows = x.n_rows();
        let n_cols = x.n_cols();
        let bins = FeatureBins::fit(x, self.params.max_bins);
        let binned = bins.bin_matrix(x);
        let builder = TreeBuilder {
            bins: &bins,
            binned: &binned,
            n_cols,
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
        };

        let base_score = quantile_of(y.to_vec(), quantile);
        let mut current = vec![base_score; n_rows];
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let row_count = sample_size(n_rows, self.params.bagging_fraction);
        let feature_count = sample_size(n_cols, self.params.feature_fraction);

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for _ in 0..self.params.n_estimators {
            // Negative gradient of the pinball loss
            let gradients: Vec<f64> = y
                .iter()
                .zip(&current)
                .map(|(target, pred)| if target > pred { quantile } else { quantile - 1.0 })
                .collect();

            let rows = sample(&mut rng, n_rows, row_count).into_vec();
            let features = sample(&mut rng, n_cols, feature_count).into_vec();

            let tree = builder.build(&rows, &gradients, &features, |leaf_rows| {
                let residuals = leaf_rows.iter().map(|&r| y[r] - current[r]).collect();
                quantile_of(residuals, quantile)
            });

            for (row, pred) in x.rows().zip(current.iter_mut()) {
                *pred += self.params.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        Ok(TrainedGradientBoostedQuantile {
            name: self.name.clone(),
            quantile,
            n_features: n_cols,
            base_score,
            learning_rate: self.params.learning_rate,
            trees,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedGradientBoostedQuantile {
    /// Number of features the model expects per row
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of boosting rounds
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check internal consistency after deserialization
    pub fn validate(&self) -> Result<()> {
        if !(self.quantile > 0.0 && self.quantile < 1.0) {
            return Err(ForecastError::DataError(format!(
                "Model quantile {} out of range",
                self.quantile
            )));
        }
        for tree in &self.trees {
            tree.check_structure()?;
        }
        if let Some(feature) = self.trees.iter().filter_map(|t| t.max_feature()).max() {
            if feature >= self.n_features {
                return Err(ForecastError::DataError(format!(
                    "Tree splits on feature {} but the model has {} features",
                    feature, self.n_features
                )));
            }
        }
        Ok(())
    }
}

impl FittedQuantileModel for TrainedGradientBoostedQuantile {
    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(ForecastError::ValidationError(format!(
                "Expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let boost: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        Ok(self.base_score + self.learning_rate * boost)
    }

    fn quantile(&self) -> f64 {
        self.quantile
    }

    fn name(&self) -> &str {
        &self.name
    }
}
