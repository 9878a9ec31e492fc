//! quotewire-fmp
//!
//! Adapter for the Financial Modeling Prep quote API. Status codes are mostly
//! meaningful (401 and 429 arrive as themselves), but a 200 with an empty
//! array is the vendor's way of saying not-found, and logical errors can come
//! back as a 200 JSON object with an `Error Message` key. Quotes arrive as an
//! array even for a single symbol, fields are numbers, `changesPercentage` is
//! in percent units, `timestamp` is Unix seconds, and batch requests join
//! symbols with commas on the same endpoint.
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use quotewire_core::config::{ProviderConfig, RateLimitStrategy};
use quotewire_core::descriptor::{DataLatency, ProviderDescriptor, RateLimitSpec};
use quotewire_core::error::{Operation, ProviderError};
use quotewire_core::http::{HttpError, HttpRequest, HttpTransport, ReqwestTransport};
use quotewire_core::model::{Quote, Snapshot};
use quotewire_core::normalize;
use quotewire_core::provider::MarketDataProvider;
use quotewire_core::registry::{self, RegistryError};

/// Registry name of this adapter.
pub const NAME: &str = "fmp";

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com";
const ERROR_BODY_LIMIT: usize = 200;

/// One element of the vendor's quote array. Only the fields the canonical
/// records need; the payload carries a dozen more.
#[derive(Debug, Deserialize)]
struct QuotePayload {
    symbol: String,
    price: f64,
    #[serde(rename = "changesPercentage")]
    changes_percentage: f64,
    change: f64,
    #[serde(rename = "dayLow")]
    day_low: f64,
    #[serde(rename = "dayHigh")]
    day_high: f64,
    volume: i64,
    open: f64,
    #[serde(rename = "previousClose")]
    previous_close: f64,
    /// Unix seconds.
    timestamp: i64,
}

/// Financial Modeling Prep provider.
pub struct FmpProvider {
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
}

impl FmpProvider {
    /// Build a provider with the production HTTP transport.
    ///
    /// # Errors
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let transport = ReqwestTransport::new(config.timeout)
            .map_err(|e| ProviderError::network(NAME, Operation::HealthCheck, e.to_string()))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a provider over an injected transport (tests).
    #[must_use]
    pub fn with_transport(config: ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Service characteristics of the vendor's free tier.
    #[must_use]
    pub const fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            name: NAME,
            tier: "free",
            rate_limit: RateLimitSpec {
                max_requests: 250,
                window: Duration::from_secs(86_400),
                strategy: RateLimitStrategy::TokenBucket,
            },
            latency: DataLatency::Delayed,
            supports_batch: true,
        }
    }

    /// Install this adapter's factory in the registry.
    ///
    /// # Errors
    /// Fails if the name is already taken.
    pub fn register() -> Result<(), RegistryError> {
        registry::register(
            NAME,
            Arc::new(|config| {
                Ok(Arc::new(FmpProvider::new(config)?) as Arc<dyn MarketDataProvider>)
            }),
        )
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    fn quote_url(&self, symbol_list: &str) -> String {
        format!(
            "{}/api/v3/quote/{}?apikey={}",
            self.base_url(),
            symbol_list,
            self.config.api_key
        )
    }

    async fn fetch_quotes(
        &self,
        cancel: &CancellationToken,
        operation: Operation,
        symbol_list: &str,
    ) -> Result<Vec<QuotePayload>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(NAME, operation));
        }
        let request = HttpRequest::get(self.quote_url(symbol_list));
        let response = self
            .transport
            .execute(cancel, request)
            .await
            .map_err(|e| transport_error(e, operation))?;

        match response.status {
            200 => {}
            401 => {
                return Err(ProviderError::from_status(
                    NAME,
                    operation,
                    401,
                    "authentication failed: invalid API key",
                ));
            }
            429 => {
                return Err(ProviderError::from_status(
                    NAME,
                    operation,
                    429,
                    "rate limit exceeded",
                ));
            }
            status => {
                return Err(ProviderError::from_status(
                    NAME,
                    operation,
                    status,
                    truncated(&response.body),
                ));
            }
        }

        match serde_json::from_str::<Vec<QuotePayload>>(&response.body) {
            Ok(quotes) => Ok(quotes),
            Err(array_err) => {
                // A 200 object with an Error Message key is a logical failure.
                if let Ok(object) =
                    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(
                        &response.body,
                    )
                {
                    if let Some(message) =
                        object.get("Error Message").and_then(serde_json::Value::as_str)
                    {
                        return Err(ProviderError::from_status(NAME, operation, 400, message));
                    }
                }
                Err(ProviderError::decode(NAME, operation, array_err.to_string()))
            }
        }
    }

    fn normalize_quote(data: &QuotePayload, operation: Operation) -> Result<Quote, ProviderError> {
        let volume = u64::try_from(data.volume).map_err(|_| {
            ProviderError::validation(NAME, operation, format!("negative volume {}", data.volume))
        })?;
        let timestamp = normalize::timestamp_from_unix(data.timestamp).ok_or_else(|| {
            ProviderError::decode(
                NAME,
                operation,
                format!("bad timestamp value {}", data.timestamp),
            )
        })?;
        let quote = Quote {
            symbol: data.symbol.trim().to_uppercase(),
            price: data.price,
            volume,
            timestamp,
            change: data.change,
            // Vendor reports percent units; canonical form is a fraction.
            change_percent: data.changes_percentage / 100.0,
            bid: None,
            ask: None,
        };
        quote
            .validate()
            .map_err(|e| ProviderError::validation(NAME, operation, e.to_string()))?;
        Ok(quote)
    }

    fn normalize_snapshot(
        data: &QuotePayload,
        operation: Operation,
    ) -> Result<Snapshot, ProviderError> {
        let snapshot = Snapshot {
            quote: Self::normalize_quote(data, operation)?,
            day_open: data.open,
            day_high: data.day_high,
            day_low: data.day_low,
            prev_close: data.previous_close,
        };
        snapshot
            .validate()
            .map_err(|e| ProviderError::validation(NAME, operation, e.to_string()))?;
        Ok(snapshot)
    }

    async fn fetch_single(
        &self,
        cancel: &CancellationToken,
        operation: Operation,
        symbol: &str,
    ) -> Result<QuotePayload, ProviderError> {
        let mut quotes = self.fetch_quotes(cancel, operation, symbol).await?;
        if quotes.is_empty() {
            // The vendor answers unknown symbols with an empty array.
            return Err(ProviderError::from_status(
                NAME,
                operation,
                404,
                format!("symbol {symbol} not found"),
            ));
        }
        Ok(quotes.swap_remove(0))
    }
}

#[async_trait]
impl MarketDataProvider for FmpProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        let payload = self
            .fetch_single(cancel, Operation::GetQuote, &symbol)
            .await?;
        Self::normalize_quote(&payload, Operation::GetQuote)
    }

    /// Native batch: the quote endpoint accepts a comma-joined symbol list.
    /// The response is keyed by symbol, so it is re-mapped onto the input
    /// order; symbols the vendor omits become `None`.
    async fn get_quotes(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(NAME, Operation::GetQuotes));
        }
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let upper: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        let payloads = self
            .fetch_quotes(cancel, Operation::GetQuotes, &upper.join(","))
            .await?;
        let by_symbol: HashMap<String, &QuotePayload> = payloads
            .iter()
            .map(|p| (p.symbol.trim().to_uppercase(), p))
            .collect();
        Ok(upper
            .iter()
            .map(|symbol| {
                by_symbol
                    .get(symbol)
                    .and_then(|payload| Self::normalize_quote(payload, Operation::GetQuotes).ok())
            })
            .collect())
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        let payload = self
            .fetch_single(cancel, Operation::GetSnapshot, &symbol)
            .await?;
        Self::normalize_snapshot(&payload, Operation::GetSnapshot)
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        self.get_quote(cancel, "AAPL").await.map(|_| ())
    }
}

fn transport_error(err: HttpError, operation: Operation) -> ProviderError {
    match err {
        HttpError::Cancelled => ProviderError::cancelled(NAME, operation),
        HttpError::TimedOut => ProviderError::network(NAME, operation, "request timed out"),
        HttpError::Transport(detail) => ProviderError::network(NAME, operation, detail),
    }
}

fn truncated(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}
