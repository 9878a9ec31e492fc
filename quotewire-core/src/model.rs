//! Canonical quote records and the validation gate adapters run before returning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Violations of the canonical record invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The symbol is empty.
    #[error("symbol cannot be empty")]
    EmptySymbol,
    /// The symbol contains whitespace, control, or lowercase characters.
    #[error("symbol {symbol:?} is not an uppercase printable identifier")]
    MalformedSymbol {
        /// The offending symbol.
        symbol: String,
    },
    /// The price is zero, negative, or not finite.
    #[error("price must be a positive finite number, got {0}")]
    InvalidPrice(f64),
    /// A quoted bid or ask is zero, negative, or not finite.
    #[error("{field} must be a positive finite number, got {value}")]
    InvalidQuotedPrice {
        /// Which side was invalid ("bid" or "ask").
        field: &'static str,
        /// The offending value.
        value: f64,
    },
    /// The change or change-percent field is not finite.
    #[error("{field} must be finite")]
    NonFinite {
        /// Name of the non-finite field.
        field: &'static str,
    },
    /// The timestamp lies in the future.
    #[error("timestamp {timestamp} is in the future")]
    FutureTimestamp {
        /// The offending timestamp.
        timestamp: DateTime<Utc>,
    },
    /// A snapshot day field is zero, negative, or not finite.
    #[error("{field} must be a positive finite number, got {value}")]
    InvalidDayField {
        /// Name of the offending day field.
        field: &'static str,
        /// The offending value.
        value: f64,
    },
    /// The day range is inverted.
    #[error("day_high {high} is below day_low {low}")]
    InvalidDayRange {
        /// Reported day high.
        high: f64,
        /// Reported day low.
        low: f64,
    },
    /// The last price falls outside the reported day range.
    #[error("price {price} falls outside day range [{low}, {high}]")]
    PriceOutsideDayRange {
        /// Last traded price.
        price: f64,
        /// Reported day low.
        low: f64,
        /// Reported day high.
        high: f64,
    },
}

/// A normalized point-in-time quote.
///
/// Produced by an adapter per call and immutable once returned. Prices are
/// dollars as fractions, `change_percent` is a decimal fraction (1.23% is
/// `0.0123`), and the timestamp is always UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Uppercase instrument identifier.
    pub symbol: String,
    /// Last traded price in dollars. Strictly positive.
    pub price: f64,
    /// Shares traded. Non-negative by construction.
    pub volume: u64,
    /// Instant the quote refers to, in UTC. Never in the future.
    pub timestamp: DateTime<Utc>,
    /// Absolute change in dollars since the previous close. May be negative.
    pub change: f64,
    /// Change as a decimal fraction of the previous close.
    pub change_percent: f64,
    /// Best bid, when the vendor reports one. Same conventions as `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<f64>,
    /// Best ask, when the vendor reports one. Same conventions as `price`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<f64>,
}

impl Quote {
    /// Run the validation gate.
    ///
    /// Adapters call this after normalization and before returning; a failure
    /// indicates either a vendor regression or an adapter bug and is mapped to
    /// a non-retryable error.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_symbol(&self.symbol)?;
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(ValidationError::InvalidPrice(self.price));
        }
        if !self.change.is_finite() {
            return Err(ValidationError::NonFinite { field: "change" });
        }
        if !self.change_percent.is_finite() {
            return Err(ValidationError::NonFinite {
                field: "change_percent",
            });
        }
        if self.timestamp > Utc::now() {
            return Err(ValidationError::FutureTimestamp {
                timestamp: self.timestamp,
            });
        }
        for (field, side) in [("bid", self.bid), ("ask", self.ask)] {
            if let Some(value) = side {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ValidationError::InvalidQuotedPrice { field, value });
                }
            }
        }
        Ok(())
    }
}

/// A quote extended with the trading day's range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The point-in-time quote this snapshot extends.
    pub quote: Quote,
    /// Opening price of the trading day.
    pub day_open: f64,
    /// Highest price of the trading day.
    pub day_high: f64,
    /// Lowest price of the trading day.
    pub day_low: f64,
    /// Previous session's closing price.
    pub prev_close: f64,
}

impl Snapshot {
    /// Run the validation gate over the embedded quote and the day range.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.quote.validate()?;
        for (field, value) in [
            ("day_open", self.day_open),
            ("day_high", self.day_high),
            ("day_low", self.day_low),
            ("prev_close", self.prev_close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::InvalidDayField { field, value });
            }
        }
        if self.day_high < self.day_low {
            return Err(ValidationError::InvalidDayRange {
                high: self.day_high,
                low: self.day_low,
            });
        }
        if self.quote.price < self.day_low || self.quote.price > self.day_high {
            return Err(ValidationError::PriceOutsideDayRange {
                price: self.quote.price,
                low: self.day_low,
                high: self.day_high,
            });
        }
        Ok(())
    }
}

fn validate_symbol(symbol: &str) -> Result<(), ValidationError> {
    if symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    let well_formed = symbol
        .chars()
        .all(|c| c.is_ascii_graphic() && !c.is_ascii_lowercase());
    if !well_formed {
        return Err(ValidationError::MalformedSymbol {
            symbol: symbol.to_string(),
        });
    }
    Ok(())
}
