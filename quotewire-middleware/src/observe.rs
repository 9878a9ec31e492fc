//! Structured per-call logging.
//!
//! Outermost layer, so the duration it reports covers everything downstream:
//! admission waits, retries, and breaker rejections are all attributed to the
//! same logical call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quotewire_core::error::ProviderError;
use quotewire_core::model::{Quote, Snapshot};
use quotewire_core::provider::MarketDataProvider;

/// Middleware that logs every operation with timing and outcome fields.
pub struct ObservedProvider {
    inner: Arc<dyn MarketDataProvider>,
    /// Prebound at construction so every event carries the same attribute.
    provider: String,
}

impl ObservedProvider {
    /// Wrap `inner`, binding its name as the `provider` log attribute.
    pub fn new(inner: Arc<dyn MarketDataProvider>) -> Self {
        let provider = inner.name().to_string();
        Self { inner, provider }
    }
}

#[async_trait]
impl MarketDataProvider for ObservedProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        let start = Instant::now();
        tracing::debug!(
            provider = %self.provider,
            operation = "get_quote",
            symbol,
            "fetching quote"
        );
        let result = self.inner.get_quote(cancel, symbol).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(quote) => tracing::info!(
                provider = %self.provider,
                operation = "get_quote",
                symbol,
                elapsed_ms,
                price = quote.price,
                volume = quote.volume,
                "fetched quote"
            ),
            Err(err) => tracing::error!(
                provider = %self.provider,
                operation = "get_quote",
                symbol,
                elapsed_ms,
                error = %err,
                "failed to fetch quote"
            ),
        }
        result
    }

    async fn get_quotes(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError> {
        let start = Instant::now();
        tracing::debug!(
            provider = %self.provider,
            operation = "get_quotes",
            requested = symbols.len(),
            symbols = ?symbols,
            "fetching quotes"
        );
        let result = self.inner.get_quotes(cancel, symbols).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(quotes) => {
                let received = quotes.iter().filter(|q| q.is_some()).count();
                tracing::info!(
                    provider = %self.provider,
                    operation = "get_quotes",
                    requested = symbols.len(),
                    received,
                    elapsed_ms,
                    "fetched quotes"
                );
            }
            Err(err) => tracing::error!(
                provider = %self.provider,
                operation = "get_quotes",
                requested = symbols.len(),
                elapsed_ms,
                error = %err,
                "failed to fetch quotes"
            ),
        }
        result
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        let start = Instant::now();
        tracing::debug!(
            provider = %self.provider,
            operation = "get_snapshot",
            symbol,
            "fetching snapshot"
        );
        let result = self.inner.get_snapshot(cancel, symbol).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(snapshot) => tracing::info!(
                provider = %self.provider,
                operation = "get_snapshot",
                symbol,
                elapsed_ms,
                price = snapshot.quote.price,
                day_high = snapshot.day_high,
                day_low = snapshot.day_low,
                "fetched snapshot"
            ),
            Err(err) => tracing::error!(
                provider = %self.provider,
                operation = "get_snapshot",
                symbol,
                elapsed_ms,
                error = %err,
                "failed to fetch snapshot"
            ),
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        let start = Instant::now();
        tracing::debug!(
            provider = %self.provider,
            operation = "health_check",
            "checking provider health"
        );
        let result = self.inner.health_check(cancel).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::info!(
                provider = %self.provider,
                operation = "health_check",
                elapsed_ms,
                "health check passed"
            ),
            Err(err) => tracing::error!(
                provider = %self.provider,
                operation = "health_check",
                elapsed_ms,
                error = %err,
                "health check failed"
            ),
        }
        result
    }
}
