//! Builder that composes a provider with its resilience layers.
//!
//! The nesting order is fixed here, not chosen by callers (see the
//! [crate-level documentation](crate) for why it is load-bearing). Callers
//! pick which layers to install; repeated `with_…` calls replace the layer's
//! configuration rather than stacking a second copy.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use quotewire_core::config::{CircuitBreakerConfig, RetryConfig, StackConfig};
use quotewire_core::error::ProviderError;
use quotewire_core::provider::MarketDataProvider;

use crate::breaker::CircuitBreakerProvider;
use crate::observe::ObservedProvider;
use crate::ratelimit::{RateLimitedProvider, RateLimiter, TokenBucket};
use crate::retry::RetryProvider;

/// Composes middleware around a base adapter in the fixed order
/// observability → circuit breaker → retry → rate limit → adapter.
pub struct ProviderBuilder {
    base: Arc<dyn MarketDataProvider>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    retry: Option<RetryConfig>,
    breaker: Option<CircuitBreakerConfig>,
    observability: bool,
}

impl ProviderBuilder {
    /// Start from a raw, unwrapped adapter.
    #[must_use]
    pub fn new(base: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            base,
            rate_limiter: None,
            retry: None,
            breaker: None,
            observability: false,
        }
    }

    /// Install (or replace) the rate-limit layer.
    #[must_use]
    pub fn with_rate_limit(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Install (or replace) the retry layer.
    #[must_use]
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Install (or replace) the circuit-breaker layer.
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = Some(config);
        self
    }

    /// Install the observability layer.
    #[must_use]
    pub fn with_observability(mut self) -> Self {
        self.observability = true;
        self
    }

    /// Wrap the layers in their fixed order and return the facade.
    #[must_use]
    pub fn build(self) -> Arc<dyn MarketDataProvider> {
        let mut provider = self.base;
        // Innermost first: each wrap sits outside the previous one.
        if let Some(limiter) = self.rate_limiter {
            provider = Arc::new(RateLimitedProvider::new(provider, limiter));
        }
        if let Some(config) = self.retry {
            provider = Arc::new(RetryProvider::new(provider, config));
        }
        if let Some(config) = self.breaker {
            provider = Arc::new(CircuitBreakerProvider::new(provider, config));
        }
        if self.observability {
            provider = Arc::new(ObservedProvider::new(provider));
        }
        provider
    }

    /// Compose the stack a [`StackConfig`] describes, honoring each layer's
    /// `enabled` flag. Observability is always installed.
    #[must_use]
    pub fn from_config(base: Arc<dyn MarketDataProvider>, config: &StackConfig) -> Arc<dyn MarketDataProvider> {
        let mut builder = Self::new(base);
        if config.rate_limit.enabled {
            builder = builder.with_rate_limit(Arc::new(TokenBucket::new(
                config.rate_limit.max_requests,
                config.rate_limit.window,
            )));
        }
        if config.retry.enabled {
            builder = builder.with_retry(config.retry.clone());
        }
        if config.circuit_breaker.enabled {
            builder = builder.with_circuit_breaker(config.circuit_breaker.clone());
        }
        builder.with_observability().build()
    }
}

/// Run a provider's health check under a deadline expressed as a
/// cancellation token, the way the startup path does.
///
/// # Errors
/// Whatever the provider's health check returns; a deadline expiry surfaces
/// as a cancellation error.
pub async fn health_check_with_deadline(
    provider: &dyn MarketDataProvider,
    deadline: std::time::Duration,
) -> Result<(), ProviderError> {
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        guard.cancel();
    });
    let result = provider.health_check(&cancel).await;
    timer.abort();
    result
}
