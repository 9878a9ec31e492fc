//! Structured provider error with retry semantics.
//!
//! Every failure that crosses the provider contract is a [`ProviderError`]:
//! which provider failed, which operation, the HTTP status involved (0 for
//! non-HTTP failures), a classification, and whether a repeated attempt may
//! succeed without caller intervention. Middleware reacts to the `retryable`
//! flag; it never re-derives retryability from the status itself.

use std::fmt;

use thiserror::Error;

/// The contract operation an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Single-symbol quote fetch.
    GetQuote,
    /// Batch quote fetch.
    GetQuotes,
    /// Single-symbol snapshot fetch.
    GetSnapshot,
    /// Credential/network liveness probe.
    HealthCheck,
}

impl Operation {
    /// Stable lowercase label used in logs and error text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetQuote => "get_quote",
            Self::GetQuotes => "get_quotes",
            Self::GetSnapshot => "get_snapshot",
            Self::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a provider failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The vendor signalled a rate limit (HTTP 429 or a body sentinel).
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    /// Credentials were rejected (HTTP 401/403 or a body sentinel).
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The symbol or resource does not exist (HTTP 404, empty result).
    #[error("not found: {0}")]
    NotFound(String),
    /// The request itself was malformed (HTTP 400 or a body sentinel).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Any other upstream HTTP failure.
    #[error("upstream HTTP {status}: {detail}")]
    Upstream {
        /// The HTTP status the vendor returned.
        status: u16,
        /// Vendor-supplied detail, truncated to the response body.
        detail: String,
    },
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),
    /// The body arrived but could not be decoded into the vendor schema.
    #[error("decode error: {0}")]
    Decode(String),
    /// The payload decoded but violates canonical invariants.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Synthesized by the circuit breaker while tripped.
    #[error("circuit breaker open")]
    CircuitOpen,
    /// The caller's cancellation handle fired.
    #[error("cancelled")]
    Cancelled,
}

/// A provider failure with retry semantics.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{provider} {operation} failed: {kind}")]
pub struct ProviderError {
    /// Name of the provider that failed.
    pub provider: String,
    /// The contract operation that failed.
    pub operation: Operation,
    /// HTTP status code involved; 0 for non-HTTP failures.
    pub status: u16,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Whether a repeated attempt may succeed without caller intervention.
    pub retryable: bool,
}

impl ProviderError {
    /// Build an error from an HTTP status, applying the retry rule:
    /// 429 and 5xx and network (0) are retryable; 4xx is not.
    pub fn from_status(
        provider: impl Into<String>,
        operation: Operation,
        status: u16,
        detail: impl Into<String>,
    ) -> Self {
        let detail = detail.into();
        let kind = match status {
            429 => ErrorKind::RateLimited(detail),
            401 | 403 => ErrorKind::Auth(detail),
            404 => ErrorKind::NotFound(detail),
            400 => ErrorKind::InvalidRequest(detail),
            0 => ErrorKind::Network(detail),
            _ => ErrorKind::Upstream { status, detail },
        };
        Self {
            provider: provider.into(),
            operation,
            status,
            kind,
            retryable: retryable_status(status),
        }
    }

    /// Build a retryable network error (no HTTP response was received).
    pub fn network(
        provider: impl Into<String>,
        operation: Operation,
        detail: impl Into<String>,
    ) -> Self {
        Self::from_status(provider, operation, 0, detail)
    }

    /// Build a non-retryable decode error for a payload that did not match
    /// the vendor schema.
    pub fn decode(
        provider: impl Into<String>,
        operation: Operation,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation,
            status: 0,
            kind: ErrorKind::Decode(detail.into()),
            retryable: false,
        }
    }

    /// Build a non-retryable validation error for a payload that decoded but
    /// violates canonical invariants.
    pub fn validation(
        provider: impl Into<String>,
        operation: Operation,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation,
            status: 0,
            kind: ErrorKind::Validation(detail.into()),
            retryable: false,
        }
    }

    /// Build the error returned when the caller's cancellation handle fires.
    pub fn cancelled(provider: impl Into<String>, operation: Operation) -> Self {
        Self {
            provider: provider.into(),
            operation,
            status: 0,
            kind: ErrorKind::Cancelled,
            retryable: false,
        }
    }

    /// Build the error the circuit breaker synthesizes while tripped.
    pub fn circuit_open(provider: impl Into<String>, operation: Operation) -> Self {
        Self {
            provider: provider.into(),
            operation,
            status: 0,
            kind: ErrorKind::CircuitOpen,
            retryable: false,
        }
    }

    /// Whether a repeated attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Whether this error was caused by the caller's cancellation handle.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Whether this error was synthesized by an open circuit breaker.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self.kind, ErrorKind::CircuitOpen)
    }

    /// Whether this error indicates rejected credentials.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self.kind, ErrorKind::Auth(_))
    }
}

/// Retry rule over HTTP status codes.
///
/// 429 and 500/502/503/504 warrant retry; 0 marks network failures, which
/// warrant retry; 400/401/403/404 are permanent; other 5xx retry, other 4xx
/// do not.
const fn retryable_status(status: u16) -> bool {
    match status {
        429 => true,
        500 | 502 | 503 | 504 => true,
        0 => true,
        400 | 401 | 403 | 404 => false,
        _ => status >= 500,
    }
}
