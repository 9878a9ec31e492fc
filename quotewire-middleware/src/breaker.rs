//! Circuit breaker: trip on consecutive transient failures, probe recovery,
//! fail fast while open.
//!
//! Only *retryable* failures count toward the trip threshold. Auth rejections,
//! not-found, and validation failures are definitive vendor answers, not signs
//! of provider instability, so they neither increment nor reset the counter.
//! Cancellations are caller-initiated and are ignored the same way.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quotewire_core::config::CircuitBreakerConfig;
use quotewire_core::error::{Operation, ProviderError};
use quotewire_core::model::{Quote, Snapshot};
use quotewire_core::provider::MarketDataProvider;

/// Current position in the breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; requests pass through.
    Closed,
    /// Tripped; requests are rejected without touching the inner provider.
    Open,
    /// One probe is exploring whether the provider recovered.
    HalfOpen,
}

struct BreakerState {
    circuit: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Middleware that fails fast when the inner provider is consistently down.
///
/// The whole state machine lives under one short-held mutex: the transitions
/// require consistent multi-field reads, so per-field atomics would race.
pub struct CircuitBreakerProvider {
    inner: Arc<dyn MarketDataProvider>,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreakerProvider {
    /// Wrap `inner` with a breaker that opens after
    /// `config.max_failures` consecutive transient failures.
    pub fn new(inner: Arc<dyn MarketDataProvider>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(BreakerState {
                circuit: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Current state, for monitoring.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.lock().expect("mutex poisoned").circuit
    }

    /// Operator override: return to CLOSED and clear the counter.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.circuit = CircuitState::Closed;
        state.failures = 0;
        state.probe_in_flight = false;
    }

    fn before_request(&self, operation: Operation) -> Result<(), ProviderError> {
        let mut state = self.state.lock().expect("mutex poisoned");
        match state.circuit {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let expired = state
                    .last_failure
                    .map_or(true, |at| at.elapsed() > self.config.reset_timeout);
                if expired {
                    // This caller observed the expiry under the lock, so it is
                    // the one probe; everyone else keeps getting rejected.
                    state.circuit = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(ProviderError::circuit_open(self.inner.name(), operation))
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    Err(ProviderError::circuit_open(self.inner.name(), operation))
                } else {
                    state.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    fn after_request<T>(&self, result: &Result<T, ProviderError>) {
        let mut state = self.state.lock().expect("mutex poisoned");
        match result {
            Ok(_) => {
                state.circuit = CircuitState::Closed;
                state.failures = 0;
                state.probe_in_flight = false;
            }
            Err(err) if err.is_cancelled() => {
                // Caller walked away; no verdict on the provider. A cancelled
                // probe hands the OPEN slot back so the next caller may probe.
                if state.circuit == CircuitState::HalfOpen {
                    state.circuit = CircuitState::Open;
                    state.probe_in_flight = false;
                }
            }
            Err(err) if !err.is_retryable() => {
                // A definitive answer proves the provider is alive.
                if state.circuit == CircuitState::HalfOpen {
                    state.circuit = CircuitState::Closed;
                    state.failures = 0;
                    state.probe_in_flight = false;
                }
            }
            Err(_) => {
                state.failures += 1;
                state.last_failure = Some(Instant::now());
                match state.circuit {
                    CircuitState::Closed => {
                        if state.failures >= self.config.max_failures {
                            state.circuit = CircuitState::Open;
                        }
                    }
                    CircuitState::HalfOpen => {
                        state.circuit = CircuitState::Open;
                        state.probe_in_flight = false;
                    }
                    CircuitState::Open => {}
                }
            }
        }
    }
}

#[async_trait]
impl MarketDataProvider for CircuitBreakerProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        self.before_request(Operation::GetQuote)?;
        let result = self.inner.get_quote(cancel, symbol).await;
        self.after_request(&result);
        result
    }

    async fn get_quotes(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError> {
        self.before_request(Operation::GetQuotes)?;
        let result = self.inner.get_quotes(cancel, symbols).await;
        self.after_request(&result);
        result
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        self.before_request(Operation::GetSnapshot)?;
        let result = self.inner.get_snapshot(cancel, symbol).await;
        self.after_request(&result);
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        self.before_request(Operation::HealthCheck)?;
        let result = self.inner.health_check(cancel).await;
        self.after_request(&result);
        result
    }
}
