//! Utility functions for the quantile_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Index splitting `len` rows into a chronological train / validation pair.
///
/// Rows `[0, split)` train and `[split, len)` validate; nothing is shuffled.
pub fn split_index(len: usize, validation_fraction: f64) -> usize {
    if len == 0 || validation_fraction <= 0.0 || validation_fraction >= 1.0 {
        return len;
    }
    ((len as f64) * (1.0 - validation_fraction)).floor() as usize
}

/// Integer percentile used in artifact file names and metric keys (0.1 -> 10)
pub fn percentile_key(quantile: f64) -> u32 {
    (quantile * 100.0).round() as u32
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advance `date` by `days` business days, skipping Saturdays and Sundays
pub fn add_business_days(date: NaiveDate, days: usize) -> Result<NaiveDate> {
    let mut current = date;
    let mut remaining = days;
    while remaining > 0 {
        current = current
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ForecastError::DataError(format!("Date overflow after {}", current)))?;
        if !is_weekend(current) {
            remaining -= 1;
        }
    }
    Ok(current)
}

/// Business-day dates for steps `1..=horizon` after `last`
pub fn future_business_days(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::with_capacity(horizon);
    let mut current = last;
    for _ in 0..horizon {
        current = add_business_days(current, 1)?;
        dates.push(current);
    }
    Ok(dates)
}

/// Parse a date written as `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or RFC 3339
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime.date());
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.date_naive());
    }
    Err(ForecastError::DataError(format!(
        "Unrecognised date: {}",
        value
    )))
}
