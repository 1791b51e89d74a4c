//! Feature engineering for tree-based quantile models.
//!
//! [`transform`] turns an ordered series into a [`FeatureFrame`]: one row per
//! observation with returns, lags, rolling statistics, RSI, MACD, Bollinger
//! bands and calendar fields. Rows whose lookback windows are not yet
//! satisfied hold nulls.
//!
//! Training consumes the frame in two stages: [`FeatureFrame::drop_incomplete`]
//! once, then a pure per-horizon [`FeatureFrame::align_horizon`].

use crate::config::{
    BOLLINGER_K, BOLLINGER_WINDOW, LAGS, MACD_FAST, MACD_SIGNAL, MACD_SLOW, ROLLING_WINDOWS,
    RSI_WINDOW,
};
use crate::data::Observation;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use trade_math::moving_averages::rolling_mean;
use trade_math::oscillators::{macd, relative_strength_index};
use trade_math::returns::{log_returns, pct_change, shift};
use trade_math::volatility::{bollinger_bands, rolling_std};

/// Name of the primary value column
pub const PRIMARY_COLUMN: &str = "close";

/// Derived feature table aligned row-for-row with its dates
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    dates: Vec<NaiveDate>,
    df: DataFrame,
}

/// Complete feature row for the "present" timestamp used at serving time
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSnapshot {
    pub date: NaiveDate,
    pub columns: Vec<String>,
    pub values: Vec<f64>,
}

/// Dense row-major matrix of complete feature values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    data: Vec<f64>,
    n_rows: usize,
}

/// Features and per-step targets for one horizon, all of equal length
#[derive(Debug, Clone)]
pub struct HorizonDataset {
    pub horizon: usize,
    pub features: FeatureMatrix,
    /// `targets[s - 1][i]` is the primary value `s` rows after row `i`
    pub targets: Vec<Vec<f64>>,
}

/// Build the feature frame for a series.
///
/// Observations are sorted by date first; duplicate dates are rejected. The
/// output has exactly one row per input observation.
pub fn transform(observations: &[Observation]) -> Result<FeatureFrame> {
    if observations.is_empty() {
        return Err(ForecastError::DataError(
            "Cannot build features from an empty series".to_string(),
        ));
    }

    let mut rows = observations.to_vec();
    rows.sort_by_key(|o| o.date);
    if let Some(pair) = rows.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(ForecastError::DataError(format!(
            "Duplicate observation date {}",
            pair[0].date
        )));
    }

    let dates: Vec<NaiveDate> = rows.iter().map(|o| o.date).collect();
    let close: Vec<f64> = rows.iter().map(|o| o.close).collect();

    let mut columns: Vec<Series> = Vec::new();

    // Raw fields appear when any observation carries them; gaps stay null
    // and are removed with the other undefined rows
    let optional_field = |name: &str, field: fn(&Observation) -> Option<f64>| {
        rows.iter()
            .any(|o| field(o).is_some())
            .then(|| optional_series(name, rows.iter().map(field)))
    };
    columns.extend(optional_field("open", |o| o.open));
    columns.extend(optional_field("high", |o| o.high));
    columns.extend(optional_field("low", |o| o.low));
    columns.push(feature_series(PRIMARY_COLUMN, &close));
    columns.extend(optional_field("volume", |o| o.volume));

    // Returns
    let return_1 = pct_change(&close, 1)?;
    columns.push(feature_series("return_1", &return_1));
    columns.push(feature_series("log_return_1", &log_returns(&return_1)));
    columns.push(feature_series("return_5", &pct_change(&close, 5)?));

    // Lags
    for lag in LAGS {
        columns.push(feature_series(&format!("lag_{}", lag), &shift(&close, lag)));
    }

    // Rolling statistics
    for window in ROLLING_WINDOWS {
        columns.push(feature_series(
            &format!("roll_mean_{}", window),
            &rolling_mean(&close, window)?,
        ));
        columns.push(feature_series(
            &format!("roll_std_{}", window),
            &rolling_std(&close, window)?,
        ));
    }

    // Indicators
    columns.push(feature_series("rsi", &relative_strength_index(&close, RSI_WINDOW)?));

    let macd_lines = macd(&close, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?;
    columns.push(feature_series("macd", &macd_lines.macd));
    columns.push(feature_series("macd_signal", &macd_lines.signal));
    columns.push(feature_series("macd_hist", &macd_lines.histogram));

    let bands = bollinger_bands(&close, BOLLINGER_WINDOW, BOLLINGER_K)?;
    columns.push(feature_series("bb_mid", &bands.middle));
    columns.push(feature_series("bb_upper", &bands.upper));
    columns.push(feature_series("bb_lower", &bands.lower));

    // Calendar (Monday = 0)
    let day_of_week: Vec<f64> = dates
        .iter()
        .map(|d| d.weekday().num_days_from_monday() as f64)
        .collect();
    let month: Vec<f64> = dates.iter().map(|d| d.month() as f64).collect();
    columns.push(feature_series("dayofweek", &day_of_week));
    columns.push(feature_series("month", &month));

    let df = DataFrame::new(columns)?;
    Ok(FeatureFrame { dates, df })
}

/// Pair features with the primary value `horizon` rows ahead.
///
/// The trailing `horizon` rows have no future value and are dropped, so
/// `x.len() == y.len()` and `y[i]` is the primary value of frame row
/// `i + horizon`.
pub fn pair_target(frame: &FeatureFrame, horizon: usize) -> Result<(FeatureFrame, Vec<f64>)> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Horizon must be greater than zero".to_string(),
        ));
    }

    let primary = frame.primary_values()?;
    let kept = frame.len().saturating_sub(horizon);
    let y = primary[horizon.min(primary.len())..].to_vec();

    Ok((frame.head(kept), y))
}

/// Null out NaN so that "undefined" has a single representation
fn feature_series(name: &str, values: &[f64]) -> Series {
    optional_series(name, values.iter().map(|&v| Some(v)))
}

fn optional_series(name: &str, values: impl Iterator<Item = Option<f64>>) -> Series {
    let values: Vec<Option<f64>> = values.map(|v| v.filter(|x| !x.is_nan())).collect();
    Series::new(name, values)
}

impl FeatureFrame {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row dates, ascending
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Underlying frame of numeric feature columns
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Feature column names in frame order
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Values of one column, `None` where undefined
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let series = self
            .df
            .column(name)
            .map_err(|e| ForecastError::DataError(format!("Column '{}' not found: {}", name, e)))?;
        Ok(series.f64()?.into_iter().collect())
    }

    /// Primary value of every row
    pub fn primary_values(&self) -> Result<Vec<f64>> {
        self.column(PRIMARY_COLUMN)?
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    ForecastError::DataError(format!("Missing primary value at row {}", i))
                })
            })
            .collect()
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Self {
        let n = n.min(self.len());
        Self {
            dates: self.dates[..n].to_vec(),
            df: self.df.slice(0, n),
        }
    }

    /// Drop every row holding an undefined value in any column
    pub fn drop_incomplete(&self) -> Result<Self> {
        let mut mask = BooleanChunked::full("complete", true, self.len());
        for series in self.df.get_columns() {
            mask = &mask & &series.is_not_null();
        }

        let dates = self
            .dates
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| keep.unwrap_or(false))
            .map(|(date, _)| *date)
            .collect();
        let df = self.df.filter(&mask)?;

        Ok(Self { dates, df })
    }

    /// Dense matrix of the named columns, in the given order.
    ///
    /// Fails if any selected value is undefined.
    pub fn matrix(&self, columns: &[String]) -> Result<FeatureMatrix> {
        let extracted = columns
            .iter()
            .map(|name| self.column(name))
            .collect::<Result<Vec<_>>>()?;

        let n_rows = self.len();
        let mut data = Vec::with_capacity(n_rows * columns.len());
        for row in 0..n_rows {
            for (col, values) in extracted.iter().enumerate() {
                let value = values[row].ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Undefined value in column '{}' at row {}",
                        columns[col], row
                    ))
                })?;
                data.push(value);
            }
        }

        FeatureMatrix::new(columns.to_vec(), data)
    }

    /// Features and step targets for one horizon.
    ///
    /// Target `s` is the primary value shifted `s` rows ahead; the trailing
    /// `horizon` rows are dropped from features and every target so all share
    /// one length. Expects a frame without undefined values.
    pub fn align_horizon(&self, horizon: usize) -> Result<HorizonDataset> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be greater than zero".to_string(),
            ));
        }
        if self.len() <= horizon {
            return Err(ForecastError::InsufficientData(format!(
                "{} complete rows cannot support horizon {}",
                self.len(),
                horizon
            )));
        }

        let primary = self.primary_values()?;
        let kept = self.len() - horizon;
        let targets = (1..=horizon)
            .map(|step| primary[step..step + kept].to_vec())
            .collect();
        let features = self.head(kept).matrix(&self.column_names())?;

        Ok(HorizonDataset {
            horizon,
            features,
            targets,
        })
    }

    /// The last row as a complete snapshot.
    ///
    /// Fails if that row has any undefined value.
    pub fn last_snapshot(&self) -> Result<FeatureSnapshot> {
        let last = self.len().checked_sub(1).ok_or_else(|| {
            ForecastError::InsufficientData("No complete feature row available".to_string())
        })?;

        let columns = self.column_names();
        let values = columns
            .iter()
            .map(|name| {
                let series = self.df.column(name)?;
                series.f64()?.get(last).ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Latest row has no value for '{}'",
                        name
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(FeatureSnapshot {
            date: self.dates[last],
            columns,
            values,
        })
    }
}

impl FeatureSnapshot {
    /// Values reordered to match `columns`, as recorded at training time
    pub fn ordered(&self, columns: &[String]) -> Result<Vec<f64>> {
        columns
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .map(|idx| self.values[idx])
                    .ok_or_else(|| {
                        ForecastError::DataError(format!(
                            "Feature snapshot is missing column '{}'",
                            name
                        ))
                    })
            })
            .collect()
    }
}

impl FeatureMatrix {
    /// Create a matrix from row-major data
    pub fn new(columns: Vec<String>, data: Vec<f64>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ForecastError::ValidationError(
                "Feature matrix needs at least one column".to_string(),
            ));
        }
        if data.len() % columns.len() != 0 {
            return Err(ForecastError::ValidationError(format!(
                "{} values do not fill rows of {} columns",
                data.len(),
                columns.len()
            )));
        }
        let n_rows = data.len() / columns.len();
        Ok(Self {
            columns,
            data,
            n_rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// One row of values
    pub fn row(&self, index: usize) -> &[f64] {
        let width = self.n_cols();
        &self.data[index * width..(index + 1) * width]
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks(self.n_cols())
    }

    /// Copy of rows `[start, end)`
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.n_rows {
            return Err(ForecastError::ValidationError(format!(
                "Row range {}..{} out of bounds for {} rows",
                start, end, self.n_rows
            )));
        }
        let width = self.n_cols();
        Ok(Self {
            columns: self.columns.clone(),
            data: self.data[start * width..end * width].to_vec(),
            n_rows: end - start,
        })
    }
}
