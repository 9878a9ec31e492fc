//! Token-bucket admission control.
//!
//! Bursts up to capacity are permitted and intended; this is not a fair
//! queue. Admission is monotonic in time: a caller admitted at `t` cannot
//! have been admitted before any caller admitted at `t' < t`, because every
//! token grant happens under the same lock.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use quotewire_core::error::{Operation, ProviderError};
use quotewire_core::model::{Quote, Snapshot};
use quotewire_core::provider::MarketDataProvider;

/// Returned by [`RateLimiter::wait`] when the caller cancels before a token
/// becomes available. No token is consumed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cancelled while waiting for rate-limit admission")]
pub struct WaitCancelled;

/// Admission control over provider requests.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consume one token, blocking until one is available or `cancel` fires.
    ///
    /// # Errors
    /// [`WaitCancelled`] when the token fires first; no token is consumed.
    async fn wait(&self, cancel: &CancellationToken) -> Result<(), WaitCancelled>;

    /// Consume one token iff one is immediately available.
    fn allow(&self) -> bool;
}

/// Token-bucket rate limiter: `max_requests` tokens accrue over `window`.
///
/// The bucket starts full, so a fresh limiter admits a burst of up to
/// `max_requests` without waiting.
pub struct TokenBucket {
    capacity: f64,
    refill_per: Duration,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_check: Instant,
}

impl TokenBucket {
    /// `max_requests` per `window`, e.g. `TokenBucket::new(5, Duration::from_secs(60))`.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max = max_requests.max(1);
        Self {
            capacity: f64::from(max),
            refill_per: window / max,
            state: Mutex::new(BucketState {
                tokens: f64::from(max),
                last_check: Instant::now(),
            }),
        }
    }

    /// Refill by elapsed time, then either consume a token or report how long
    /// until one accrues.
    fn try_consume(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().expect("mutex poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_check);
        let refill = elapsed.as_secs_f64() / self.refill_per.as_secs_f64();
        state.tokens = (state.tokens + refill).min(self.capacity);
        state.last_check = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        let deficit = 1.0 - state.tokens;
        Err(self.refill_per.mul_f64(deficit))
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn wait(&self, cancel: &CancellationToken) -> Result<(), WaitCancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(WaitCancelled);
            }
            match self.try_consume() {
                Ok(()) => return Ok(()),
                // Sleep the exact deficit with the lock released, then retry;
                // another caller may have taken the token in the meantime.
                Err(wait_for) => tokio::select! {
                    () = cancel.cancelled() => return Err(WaitCancelled),
                    () = tokio::time::sleep(wait_for) => {}
                },
            }
        }
    }

    fn allow(&self) -> bool {
        self.try_consume().is_ok()
    }
}

/// Middleware that gates every operation on rate-limit admission.
///
/// A batch call consumes a single token regardless of how many symbols it
/// carries; vendors with native batch endpoints bill it as one request.
pub struct RateLimitedProvider {
    inner: Arc<dyn MarketDataProvider>,
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitedProvider {
    /// Gate `inner` behind `limiter`.
    pub fn new(inner: Arc<dyn MarketDataProvider>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    async fn admit(
        &self,
        cancel: &CancellationToken,
        operation: Operation,
    ) -> Result<(), ProviderError> {
        self.limiter
            .wait(cancel)
            .await
            .map_err(|WaitCancelled| ProviderError::cancelled(self.inner.name(), operation))
    }
}

#[async_trait]
impl MarketDataProvider for RateLimitedProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        self.admit(cancel, Operation::GetQuote).await?;
        self.inner.get_quote(cancel, symbol).await
    }

    async fn get_quotes(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError> {
        self.admit(cancel, Operation::GetQuotes).await?;
        self.inner.get_quotes(cancel, symbols).await
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        self.admit(cancel, Operation::GetSnapshot).await?;
        self.inner.get_snapshot(cancel, symbol).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        self.admit(cancel, Operation::HealthCheck).await?;
        self.inner.health_check(cancel).await
    }
}
