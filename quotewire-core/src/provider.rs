//! The provider contract implemented by vendor adapters and middleware.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::model::{Quote, Snapshot};

/// A source of normalized market data.
///
/// Implemented by vendor adapters and re-exposed unchanged by every
/// middleware layer, so the fetch loop never knows whether it holds a raw
/// adapter or a fully composed facade.
///
/// Every operation must be safe for concurrent invocation on the same
/// instance and must observe the supplied cancellation token at each
/// suspension point. An operation invoked with an already-cancelled token
/// returns a cancellation error without performing network I/O.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch a single quote.
    ///
    /// Symbol lookup is case-insensitive; the returned `symbol` is uppercase.
    /// Results are never cached by the provider layer.
    ///
    /// # Errors
    /// A structured [`ProviderError`] for every failure, including
    /// cancellation.
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError>;

    /// Fetch quotes for a batch of symbols.
    ///
    /// The returned sequence has the same length and order as the input;
    /// `None` marks a per-symbol failure that is not fatal to the batch.
    /// Authentication and other non-retryable top-level failures fail the
    /// whole call. An empty input yields `Ok(vec![])` without I/O.
    ///
    /// # Errors
    /// A structured [`ProviderError`] for top-level failures only.
    async fn get_quotes(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError>;

    /// Fetch a quote extended with the trading day's range.
    ///
    /// Same conventions as [`get_quote`](Self::get_quote), plus the snapshot
    /// range invariants.
    ///
    /// # Errors
    /// A structured [`ProviderError`] for every failure.
    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError>;

    /// Stable lowercase alphanumeric identifier.
    ///
    /// Used as the registry key and as a log attribute; stable across calls.
    fn name(&self) -> &str;

    /// Perform a minimal live call that exercises credentials and network.
    ///
    /// Intended for startup fail-fast; the caller attaches a deadline to the
    /// cancellation token.
    ///
    /// # Errors
    /// A structured [`ProviderError`]; an authentication error here should
    /// abort the process.
    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError>;
}
