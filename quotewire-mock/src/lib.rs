//! quotewire-mock
//!
//! CI-safe test doubles for the provider fabric: a deterministic
//! [`MockProvider`] with a scriptable outcome queue, a scripted
//! [`FakeTransport`](transport::FakeTransport) for exercising real adapters
//! without a network, and the black-box [`contract`] harness every conforming
//! provider must pass.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;

use quotewire_core::error::{Operation, ProviderError};
use quotewire_core::model::{Quote, Snapshot};
use quotewire_core::provider::MarketDataProvider;

pub mod contract;
pub mod transport;

/// Batch symbols that resolve to an absent entry instead of a quote,
/// mimicking a vendor that has no data for them.
const ABSENT_SYMBOLS: &[&str] = &["INVALID", "MISSING"];

#[derive(Default)]
struct MockState {
    script: VecDeque<Result<Quote, ProviderError>>,
    health_error: Option<ProviderError>,
    calls: u32,
}

/// Deterministic in-memory provider.
///
/// With an empty script every symbol resolves to a stable fixture quote;
/// pushed outcomes are consumed front-first, one per operation. Call counts
/// include every contract operation, which is what retry and breaker tests
/// assert on.
pub struct MockProvider {
    name: String,
    state: Mutex<MockState>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// A mock named `"mock"`.
    #[must_use]
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// A mock with a custom (still lowercase alphanumeric) name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Queue a successful outcome.
    pub fn push_quote(&self, quote: Quote) {
        self.state
            .lock()
            .expect("mutex poisoned")
            .script
            .push_back(Ok(quote));
    }

    /// Queue a failure outcome.
    pub fn push_error(&self, error: ProviderError) {
        self.state
            .lock()
            .expect("mutex poisoned")
            .script
            .push_back(Err(error));
    }

    /// Queue `n` copies of a failure outcome.
    pub fn fail_times(&self, n: u32, error: &ProviderError) {
        let mut state = self.state.lock().expect("mutex poisoned");
        for _ in 0..n {
            state.script.push_back(Err(error.clone()));
        }
    }

    /// Make `health_check` fail with `error` (or succeed again with `None`).
    pub fn set_health_error(&self, error: Option<ProviderError>) {
        self.state.lock().expect("mutex poisoned").health_error = error;
    }

    /// Operations observed so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.state.lock().expect("mutex poisoned").calls
    }

    /// Drop the script, counters, and health override.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.script.clear();
        state.health_error = None;
        state.calls = 0;
    }

    /// The fixture quote returned for `symbol` when the script is empty.
    /// Deterministic: the price is derived from the symbol bytes.
    #[must_use]
    pub fn fixture_quote(symbol: &str) -> Quote {
        let upper = symbol.trim().to_uppercase();
        let seed = upper
            .bytes()
            .fold(11u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        let price = 50.0 + (seed % 5_000) as f64 / 10.0;
        Quote {
            symbol: upper,
            price,
            volume: 1_000_000 + seed % 9_000_000,
            timestamp: Utc::now() - ChronoDuration::minutes(5),
            change: 1.50,
            change_percent: 0.015,
            bid: Some(price - 0.02),
            ask: Some(price + 0.02),
        }
    }

    fn snapshot_around(quote: Quote) -> Snapshot {
        Snapshot {
            day_open: quote.price - 1.0,
            day_high: quote.price + 2.0,
            day_low: quote.price - 2.0,
            prev_close: quote.price - 1.5,
            quote,
        }
    }

    fn next_outcome(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let mut state = self.state.lock().expect("mutex poisoned");
        state.calls += 1;
        match state.script.pop_front() {
            Some(outcome) => outcome,
            None => Ok(Self::fixture_quote(symbol)),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(&self.name, Operation::GetQuote));
        }
        self.next_outcome(symbol)
    }

    async fn get_quotes(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(&self.name, Operation::GetQuotes));
        }
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        {
            let mut state = self.state.lock().expect("mutex poisoned");
            state.calls += 1;
            // A scripted failure applies to the whole batch.
            if let Some(Err(_)) = state.script.front() {
                let Some(Err(err)) = state.script.pop_front() else {
                    unreachable!("front was just observed to be Err");
                };
                return Err(err);
            }
        }
        Ok(symbols
            .iter()
            .map(|symbol| {
                let upper = symbol.trim().to_uppercase();
                if ABSENT_SYMBOLS.contains(&upper.as_str()) {
                    None
                } else {
                    Some(Self::fixture_quote(symbol))
                }
            })
            .collect())
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(&self.name, Operation::GetSnapshot));
        }
        let quote = self.next_outcome(symbol)?;
        Ok(Self::snapshot_around(quote))
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(&self.name, Operation::HealthCheck));
        }
        let mut state = self.state.lock().expect("mutex poisoned");
        state.calls += 1;
        match &state.health_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
