//! Exponential backoff with jitter over retryable failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quotewire_core::config::RetryConfig;
use quotewire_core::error::{Operation, ProviderError};
use quotewire_core::model::{Quote, Snapshot};
use quotewire_core::provider::MarketDataProvider;

/// Middleware that retries transient failures with exponential backoff.
///
/// `max_attempts` counts the initial try. Non-retryable errors propagate
/// immediately, there is no sleep after the final attempt, and a cancellation
/// during backoff aborts the whole call with a cancellation error.
pub struct RetryProvider {
    inner: Arc<dyn MarketDataProvider>,
    config: RetryConfig,
}

impl RetryProvider {
    /// Wrap `inner` with the given retry policy.
    pub fn new(inner: Arc<dyn MarketDataProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// `min(max_backoff, initial × multiplier^attempt_index)`, then an
    /// optional uniform jitter factor in `[1.0, 1.5)`.
    fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let exponent = i32::try_from(attempt_index).unwrap_or(i32::MAX);
        let mut backoff =
            self.config.initial_backoff.as_secs_f64() * self.config.multiplier.powi(exponent);
        backoff = backoff.min(self.config.max_backoff.as_secs_f64());
        if self.config.jitter {
            backoff *= 1.0 + rand::random::<f64>() * 0.5;
        }
        Duration::from_secs_f64(backoff)
    }

    async fn sleep_backoff(
        &self,
        cancel: &CancellationToken,
        attempt_index: u32,
        operation: Operation,
    ) -> Result<(), ProviderError> {
        let delay = self.backoff_delay(attempt_index);
        tokio::select! {
            () = cancel.cancelled() => Err(ProviderError::cancelled(self.inner.name(), operation)),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

macro_rules! retry_loop {
    ($self:ident, $cancel:ident, $operation:expr, $call:expr) => {{
        let attempts = $self.attempts();
        let mut attempt = 0u32;
        loop {
            match $call {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || attempt + 1 >= attempts {
                        return Err(err);
                    }
                    $self.sleep_backoff($cancel, attempt, $operation).await?;
                    attempt += 1;
                }
            }
        }
    }};
}

#[async_trait]
impl MarketDataProvider for RetryProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        retry_loop!(
            self,
            cancel,
            Operation::GetQuote,
            self.inner.get_quote(cancel, symbol).await
        )
    }

    async fn get_quotes(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError> {
        retry_loop!(
            self,
            cancel,
            Operation::GetQuotes,
            self.inner.get_quotes(cancel, symbols).await
        )
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        retry_loop!(
            self,
            cancel,
            Operation::GetSnapshot,
            self.inner.get_snapshot(cancel, symbol).await
        )
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        retry_loop!(
            self,
            cancel,
            Operation::HealthCheck,
            self.inner.health_check(cancel).await
        )
    }
}
