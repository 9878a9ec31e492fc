//! Configuration types for a provider and its middleware stack.
//!
//! The YAML loader itself lives outside this workspace; after it substitutes
//! `${NAME}` references and deserializes, the core receives a [`StackConfig`].
//! Validation happens in one place ([`StackConfig::validate`]) so a bad
//! configuration fails before anything is partially initialized.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration problems detected at load time. All of them are fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// An `${NAME}` reference named a variable absent from the environment.
    #[error("environment variable {name:?} referenced in config is not set")]
    MissingEnvVar {
        /// The referenced variable name.
        name: String,
    },
    /// An `${` opener had no closing brace.
    #[error("unterminated ${{...}} reference in {input:?}")]
    UnterminatedEnvRef {
        /// The offending input string.
        input: String,
    },
    /// The API key is empty after substitution.
    #[error("provider api_key must not be empty")]
    MissingApiKey,
    /// A base URL did not use HTTPS.
    #[error("base_url {url:?} must use https")]
    InsecureBaseUrl {
        /// The offending URL.
        url: String,
    },
    /// A duration field was zero.
    #[error("{field} must be positive")]
    NonPositiveDuration {
        /// The offending field path.
        field: &'static str,
    },
    /// `max_backoff` was below `initial_backoff`.
    #[error("retry.max_backoff ({max:?}) must be >= retry.initial_backoff ({initial:?})")]
    BackoffRange {
        /// Configured initial backoff.
        initial: Duration,
        /// Configured maximum backoff.
        max: Duration,
    },
    /// The backoff multiplier was below 1.0.
    #[error("retry.multiplier must be >= 1.0, got {0}")]
    MultiplierTooSmall(f64),
    /// `rate_limit.max_requests` was zero.
    #[error("rate_limit.max_requests must be > 0")]
    ZeroMaxRequests,
    /// `retry.max_attempts` was zero.
    #[error("retry.max_attempts must be >= 1")]
    ZeroMaxAttempts,
    /// `circuit_breaker.max_failures` was zero.
    #[error("circuit_breaker.max_failures must be >= 1")]
    ZeroMaxFailures,
}

/// Admission strategy for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RateLimitStrategy {
    /// Token bucket: bursts up to capacity, refill over the window.
    #[default]
    TokenBucket,
}

/// Connection settings for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registered provider name (lowercase).
    pub name: String,
    /// API key; may contain `${NAME}` references resolved at load time.
    pub api_key: String,
    /// Override for the vendor's default endpoint. HTTPS, no trailing slash.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    /// Vendor-specific toggles (e.g. `auth: bearer`).
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl ProviderConfig {
    /// Substitute `${NAME}` references in the API key against the process
    /// environment. A missing variable is fatal.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingEnvVar`] or
    /// [`ConfigError::UnterminatedEnvRef`].
    pub fn resolve_api_key(&mut self) -> Result<(), ConfigError> {
        self.api_key = expand_env(&self.api_key)?;
        Ok(())
    }
}

/// Rate-limit layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the layer is installed at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Admission strategy.
    #[serde(default)]
    pub strategy: RateLimitStrategy,
    /// Requests permitted per window.
    pub max_requests: u32,
    /// The window those requests accrue over.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: RateLimitStrategy::TokenBucket,
            max_requests: 5,
            window: Duration::from_secs(60),
        }
    }
}

/// Retry layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether the layer is installed at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Total attempts, inclusive of the first try.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Exponential growth factor per attempt.
    pub multiplier: f64,
    /// Multiply each backoff by a uniform factor in `[1.0, 1.5)`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Circuit-breaker layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Whether the layer is installed at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Consecutive transient failures before the circuit opens.
    pub max_failures: u32,
    /// Time spent open before a single probe is allowed through.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failures: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// The full configuration surface the loader hands to the core: one provider
/// plus its middleware stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Provider connection settings.
    pub provider: ProviderConfig,
    /// Rate-limit layer settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Retry layer settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Circuit-breaker layer settings.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl StackConfig {
    /// Check every static invariant of the configuration.
    ///
    /// Whether `provider.name` is actually registered is checked at bootstrap,
    /// where the registry is in scope.
    ///
    /// # Errors
    /// Returns the first violated invariant; nothing is partially applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if let Some(url) = &self.provider.base_url {
            if !url.starts_with("https://") {
                return Err(ConfigError::InsecureBaseUrl { url: url.clone() });
            }
        }
        if self.provider.timeout.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "provider.timeout",
            });
        }
        if self.rate_limit.enabled {
            if self.rate_limit.max_requests == 0 {
                return Err(ConfigError::ZeroMaxRequests);
            }
            if self.rate_limit.window.is_zero() {
                return Err(ConfigError::NonPositiveDuration {
                    field: "rate_limit.window",
                });
            }
        }
        if self.retry.enabled {
            if self.retry.max_attempts == 0 {
                return Err(ConfigError::ZeroMaxAttempts);
            }
            if self.retry.initial_backoff.is_zero() {
                return Err(ConfigError::NonPositiveDuration {
                    field: "retry.initial_backoff",
                });
            }
            if self.retry.max_backoff < self.retry.initial_backoff {
                return Err(ConfigError::BackoffRange {
                    initial: self.retry.initial_backoff,
                    max: self.retry.max_backoff,
                });
            }
            if self.retry.multiplier < 1.0 {
                return Err(ConfigError::MultiplierTooSmall(self.retry.multiplier));
            }
        }
        if self.circuit_breaker.enabled {
            if self.circuit_breaker.max_failures == 0 {
                return Err(ConfigError::ZeroMaxFailures);
            }
            if self.circuit_breaker.reset_timeout.is_zero() {
                return Err(ConfigError::NonPositiveDuration {
                    field: "circuit_breaker.reset_timeout",
                });
            }
        }
        Ok(())
    }
}

/// Substitute every `${NAME}` reference in `input` against the process
/// environment.
///
/// # Errors
/// A reference to an unset variable or an unterminated `${` is fatal.
pub fn expand_env(input: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::UnterminatedEnvRef {
                input: input.to_string(),
            });
        };
        let name = &after[..end];
        let value = std::env::var(name).map_err(|_| ConfigError::MissingEnvVar {
            name: name.to_string(),
        })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_enabled() -> bool {
    true
}
