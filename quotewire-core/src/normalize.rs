//! Parsers for the price/volume/percentage/timestamp encodings vendors use.
//!
//! Each vendor reports the same facts in a different shape: prices as decimal
//! strings or numbers, percentages with or without a `%` suffix, timestamps as
//! bare dates, RFC 3339 strings, Unix seconds, or Unix milliseconds. Adapters
//! compose these primitives with their own schema; nothing here knows about
//! any particular vendor.
//!
//! Positivity of prices is deliberately not checked here. That is the
//! validation gate's job ([`crate::model::Quote::validate`]), which runs after
//! normalization. Volume is the exception: a negative share count can never be
//! represented, so it is rejected at parse time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

/// Unix values above this threshold are interpreted as milliseconds.
const UNIX_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Failures to parse a raw vendor value into its canonical shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The raw value could not be read as a price.
    #[error("invalid price {0:?}")]
    InvalidPrice(String),
    /// The raw value could not be read as a share count.
    #[error("invalid volume {0:?}")]
    InvalidVolume(String),
    /// The raw value could not be read as a percentage.
    #[error("invalid percentage {0:?}")]
    InvalidPercentage(String),
    /// The raw value could not be read as a timestamp.
    #[error("unparseable timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Parse a price into dollars.
///
/// Accepts decimal strings (`"158.5400"`), integers, and floats. Never cents.
///
/// # Errors
/// Returns [`NormalizeError::InvalidPrice`] on any other shape.
pub fn parse_price(raw: &Value) -> Result<f64, NormalizeError> {
    match raw {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| NormalizeError::InvalidPrice(s.clone())),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| NormalizeError::InvalidPrice(n.to_string())),
        other => Err(NormalizeError::InvalidPrice(other.to_string())),
    }
}

/// Parse a share count.
///
/// Accepts decimal strings (`"6640217"`) and numeric values; fractional
/// values truncate toward zero. Negative counts are rejected here rather
/// than at the validation gate because the canonical type cannot hold them.
///
/// # Errors
/// Returns [`NormalizeError::InvalidVolume`] on negative or unparseable input.
pub fn parse_volume(raw: &Value) -> Result<u64, NormalizeError> {
    match raw {
        Value::String(s) => {
            let count = s
                .trim()
                .parse::<i64>()
                .map_err(|_| NormalizeError::InvalidVolume(s.clone()))?;
            u64::try_from(count).map_err(|_| NormalizeError::InvalidVolume(s.clone()))
        }
        Value::Number(n) => {
            if let Some(count) = n.as_u64() {
                return Ok(count);
            }
            if let Some(count) = n.as_i64() {
                return u64::try_from(count)
                    .map_err(|_| NormalizeError::InvalidVolume(n.to_string()));
            }
            let float = n
                .as_f64()
                .ok_or_else(|| NormalizeError::InvalidVolume(n.to_string()))?;
            if float < 0.0 || !float.is_finite() {
                return Err(NormalizeError::InvalidVolume(n.to_string()));
            }
            Ok(float as u64)
        }
        other => Err(NormalizeError::InvalidVolume(other.to_string())),
    }
}

/// Parse a percentage into a decimal fraction.
///
/// Accepts strings with an optional `%` suffix (`"1.3618%"`) and numbers
/// expressed in percent units (`1.23` meaning 1.23%). The result is always
/// divided by 100: 1.5% becomes `0.015`.
///
/// # Errors
/// Returns [`NormalizeError::InvalidPercentage`] on unparseable input.
pub fn parse_percentage(raw: &Value) -> Result<f64, NormalizeError> {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%');
            let pct = trimmed
                .parse::<f64>()
                .map_err(|_| NormalizeError::InvalidPercentage(s.clone()))?;
            Ok(pct / 100.0)
        }
        Value::Number(n) => {
            let pct = n
                .as_f64()
                .ok_or_else(|| NormalizeError::InvalidPercentage(n.to_string()))?;
            Ok(pct / 100.0)
        }
        other => Err(NormalizeError::InvalidPercentage(other.to_string())),
    }
}

/// Parse a timestamp of variable shape into UTC.
///
/// Accepts RFC 3339 with optional sub-second precision, a bare date
/// (`YYYY-MM-DD`, midnight UTC), a handful of common datetime layouts, Unix
/// seconds (numeric values at or below 10^12), Unix milliseconds (above
/// 10^12), and fractional Unix seconds.
///
/// # Errors
/// Returns [`NormalizeError::InvalidTimestamp`] when no layout matches.
pub fn parse_timestamp(raw: &Value) -> Result<DateTime<Utc>, NormalizeError> {
    match raw {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => {
            if let Some(unix) = n.as_i64() {
                return timestamp_from_unix(unix)
                    .ok_or_else(|| NormalizeError::InvalidTimestamp(n.to_string()));
            }
            let float = n
                .as_f64()
                .ok_or_else(|| NormalizeError::InvalidTimestamp(n.to_string()))?;
            let secs = float.trunc() as i64;
            let nanos = ((float - float.trunc()) * 1e9) as u32;
            Utc.timestamp_opt(secs, nanos)
                .single()
                .ok_or_else(|| NormalizeError::InvalidTimestamp(n.to_string()))
        }
        other => Err(NormalizeError::InvalidTimestamp(other.to_string())),
    }
}

/// Interpret an integer Unix value, disambiguating seconds from milliseconds
/// by magnitude: values above 10^12 are milliseconds.
#[must_use]
pub fn timestamp_from_unix(value: i64) -> Option<DateTime<Utc>> {
    if value > UNIX_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn parse_timestamp_str(raw: &str) -> Result<DateTime<Utc>, NormalizeError> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        // EOD timestamps carry no intraday time; midnight UTC by convention.
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| NormalizeError::InvalidTimestamp(raw.to_string()))?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    const LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M:%S"];
    for layout in LAYOUTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Ok(Utc.from_utc_datetime(&ts));
        }
    }
    Err(NormalizeError::InvalidTimestamp(raw.to_string()))
}
