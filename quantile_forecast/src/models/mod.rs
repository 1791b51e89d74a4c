//! Quantile regression models

use crate::error::Result;
use crate::features::FeatureMatrix;
use std::fmt::Debug;

/// Fitted model predicting one quantile of a future value
pub trait FittedQuantileModel: Debug {
    /// Predict from a single feature row
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    /// Predict every row of a matrix
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        x.rows().map(|row| self.predict_row(row)).collect()
    }

    /// Quantile this model was fitted for
    fn quantile(&self) -> f64;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Unfitted model configuration that can be fitted for any quantile
pub trait QuantileRegressor: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: FittedQuantileModel;

    /// Fit the model on `x` to predict the `quantile` of `y`
    fn fit(&self, x: &FeatureMatrix, y: &[f64], quantile: f64) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod gradient_boosting;
mod tree;

pub use gradient_boosting::{GbmParams, GradientBoostedQuantile, TrainedGradientBoostedQuantile};
