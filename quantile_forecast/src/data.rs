//! Raw series handling: observations, identifiers and series providers

use crate::error::{ForecastError, Result};
use crate::utils::parse_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One time step of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    /// Primary value
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Observation {
    /// Observation carrying only the primary value
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    /// Full OHLCV observation
    pub fn ohlcv(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            volume: Some(volume),
        }
    }
}

/// Optional inclusive date bounds for fetching a series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// No bounds
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(ForecastError::ValidationError(format!(
                    "Range start {} is after end {}",
                    s, e
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Canonical form of a series identifier: trimmed and upper-cased.
///
/// Identifiers name directories in the artifact store, so anything that could
/// escape the models directory is rejected.
pub fn normalize_series_id(series_id: &str) -> Result<String> {
    let id = series_id.trim().to_uppercase();
    if id.is_empty() {
        return Err(ForecastError::ValidationError(
            "Series identifier must not be empty".to_string(),
        ));
    }
    if id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(ForecastError::ValidationError(format!(
            "Invalid series identifier: {}",
            series_id
        )));
    }
    Ok(id)
}

/// Source of raw observations for a series
pub trait SeriesProvider {
    /// Fetch the observations of `series_id` within `range`, ordered by date
    fn fetch(&self, series_id: &str, range: DateRange) -> Result<Vec<Observation>>;
}

fn finish_fetch(series_id: &str, range: DateRange, rows: Vec<Observation>) -> Result<Vec<Observation>> {
    let mut rows: Vec<Observation> = rows.into_iter().filter(|o| range.contains(o.date)).collect();
    if rows.is_empty() {
        return Err(ForecastError::DataError(format!(
            "No observations available for {}",
            series_id
        )));
    }
    rows.sort_by_key(|o| o.date);
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    #[serde(default)]
    open: Option<f64>,
    #[serde(default)]
    high: Option<f64>,
    #[serde(default)]
    low: Option<f64>,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
}

/// Reads `{data_dir}/{SERIES_ID}.csv` files with a header row
#[derive(Debug, Clone)]
pub struct CsvSeriesProvider {
    data_dir: PathBuf,
}

impl CsvSeriesProvider {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the CSV file backing `series_id`
    pub fn path_for(&self, series_id: &str) -> Result<PathBuf> {
        let id = normalize_series_id(series_id)?;
        Ok(self.data_dir.join(format!("{}.csv", id)))
    }

    /// Load every row of a CSV file in file order
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Observation>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.deserialize::<CsvRow>() {
            let row = record?;
            rows.push(Observation {
                date: parse_date(&row.date)?,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        Ok(rows)
    }
}

impl SeriesProvider for CsvSeriesProvider {
    fn fetch(&self, series_id: &str, range: DateRange) -> Result<Vec<Observation>> {
        let path = self.path_for(series_id)?;
        if !path.exists() {
            return Err(ForecastError::DataError(format!(
                "No data file for {} at {}",
                series_id,
                path.display()
            )));
        }
        let rows = Self::read_csv(&path)?;
        log::debug!("Read {} rows for {} from {}", rows.len(), series_id, path.display());
        finish_fetch(series_id, range, rows)
    }
}

/// Series held in memory, keyed by normalized identifier
#[derive(Debug, Clone, Default)]
pub struct InMemorySeriesProvider {
    series: HashMap<String, Vec<Observation>>,
}

impl InMemorySeriesProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the observations of a series
    pub fn insert(&mut self, series_id: &str, observations: Vec<Observation>) -> Result<()> {
        let id = normalize_series_id(series_id)?;
        self.series.insert(id, observations);
        Ok(())
    }
}

impl SeriesProvider for InMemorySeriesProvider {
    fn fetch(&self, series_id: &str, range: DateRange) -> Result<Vec<Observation>> {
        let id = normalize_series_id(series_id)?;
        let rows = self.series.get(&id).cloned().unwrap_or_default();
        finish_fetch(&id, range, rows)
    }
}
