//! quotewire-alphavantage
//!
//! Adapter for the Alpha Vantage `GLOBAL_QUOTE` API. The vendor's quirks this
//! adapter absorbs: HTTP status codes carry no meaning (logical errors come
//! back as 200 with body sentinels), every field is a string, percentages
//! carry a `%` suffix, the latest-trading-day timestamp is a bare date, and
//! there is no batch endpoint.
#![warn(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
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
pub const NAME: &str = "alphavantage";

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// How much of an unexpected body to carry into error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Alpha Vantage provider.
pub struct AlphaVantageProvider {
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
}

impl AlphaVantageProvider {
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
                max_requests: 5,
                window: Duration::from_secs(60),
                strategy: RateLimitStrategy::TokenBucket,
            },
            latency: DataLatency::Delayed,
            supports_batch: false,
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
                Ok(Arc::new(AlphaVantageProvider::new(config)?) as Arc<dyn MarketDataProvider>)
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

    fn quote_url(&self, symbol: &str) -> String {
        format!(
            "{}/query?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.base_url(),
            symbol,
            self.config.api_key
        )
    }

    /// Fetch and unwrap a `Global Quote` object, translating the vendor's
    /// 200-with-sentinel error convention into the taxonomy.
    async fn fetch_global_quote(
        &self,
        cancel: &CancellationToken,
        operation: Operation,
        symbol: &str,
    ) -> Result<Map<String, Value>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(NAME, operation));
        }
        let request = HttpRequest::get(self.quote_url(symbol));
        let response = self
            .transport
            .execute(cancel, request)
            .await
            .map_err(|e| transport_error(e, operation))?;

        if response.status != 200 {
            // Rare for this vendor, but infrastructure failures do surface here.
            return Err(ProviderError::from_status(
                NAME,
                operation,
                response.status,
                truncated(&response.body),
            ));
        }

        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))?;

        // 200 does not mean success here; the body carries the verdict.
        if let Some(note) = body.get("Note").and_then(Value::as_str) {
            return Err(ProviderError::from_status(NAME, operation, 429, note));
        }
        if let Some(message) = body.get("Error Message").and_then(Value::as_str) {
            let status = if message.to_ascii_lowercase().contains("apikey") {
                401
            } else {
                400
            };
            return Err(ProviderError::from_status(NAME, operation, status, message));
        }
        if let Some(info) = body.get("Information").and_then(Value::as_str) {
            return Err(ProviderError::from_status(NAME, operation, 400, info));
        }

        let Some(global) = body.get("Global Quote").and_then(Value::as_object) else {
            return Err(ProviderError::decode(
                NAME,
                operation,
                "missing Global Quote in response",
            ));
        };
        if global.is_empty() {
            // The vendor answers unknown symbols with an empty object.
            return Err(ProviderError::from_status(
                NAME,
                operation,
                404,
                format!("no data for {symbol}"),
            ));
        }
        Ok(global.clone())
    }

    fn normalize_quote(
        data: &Map<String, Value>,
        operation: Operation,
    ) -> Result<Quote, ProviderError> {
        let symbol = data
            .get("01. symbol")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_uppercase();

        let quote = Quote {
            symbol,
            price: normalize::parse_price(field(data, "05. price", operation)?)
                .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))?,
            volume: normalize::parse_volume(field(data, "06. volume", operation)?)
                .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))?,
            timestamp: normalize::parse_timestamp(field(data, "07. latest trading day", operation)?)
                .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))?,
            change: normalize::parse_price(field(data, "09. change", operation)?)
                .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))?,
            change_percent: normalize::parse_percentage(field(data, "10. change percent", operation)?)
                .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))?,
            bid: None,
            ask: None,
        };
        quote
            .validate()
            .map_err(|e| ProviderError::validation(NAME, operation, e.to_string()))?;
        Ok(quote)
    }

    fn normalize_snapshot(
        data: &Map<String, Value>,
        operation: Operation,
    ) -> Result<Snapshot, ProviderError> {
        let quote = Self::normalize_quote(data, operation)?;
        let day_price = |key: &'static str| -> Result<f64, ProviderError> {
            normalize::parse_price(field(data, key, operation)?)
                .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))
        };
        let snapshot = Snapshot {
            quote,
            day_open: day_price("02. open")?,
            day_high: day_price("03. high")?,
            day_low: day_price("04. low")?,
            prev_close: day_price("08. previous close")?,
        };
        snapshot
            .validate()
            .map_err(|e| ProviderError::validation(NAME, operation, e.to_string()))?;
        Ok(snapshot)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        let data = self
            .fetch_global_quote(cancel, Operation::GetQuote, &symbol)
            .await?;
        Self::normalize_quote(&data, Operation::GetQuote)
    }

    /// No batch endpoint: sequential per-symbol fan-out. Kept sequential on
    /// purpose so a batch cannot blow the vendor's per-minute quota absent a
    /// bounded worker pool.
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
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            match self.get_quote(cancel, symbol).await {
                Ok(quote) => quotes.push(Some(quote)),
                Err(err) if err.is_cancelled() || err.is_auth() => return Err(err),
                Err(_) => quotes.push(None),
            }
        }
        Ok(quotes)
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        let data = self
            .fetch_global_quote(cancel, Operation::GetSnapshot, &symbol)
            .await?;
        Self::normalize_snapshot(&data, Operation::GetSnapshot)
    }

    fn name(&self) -> &str {
        NAME
    }

    async fn health_check(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        // A real quote for a liquid symbol exercises credentials and network.
        self.get_quote(cancel, "AAPL").await.map(|_| ())
    }
}

fn field<'a>(
    data: &'a Map<String, Value>,
    key: &'static str,
    operation: Operation,
) -> Result<&'a Value, ProviderError> {
    data.get(key)
        .ok_or_else(|| ProviderError::decode(NAME, operation, format!("missing field {key:?}")))
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
