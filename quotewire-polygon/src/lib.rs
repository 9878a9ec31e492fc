//! quotewire-polygon
//!
//! Adapter for the Polygon.io stock snapshot API. HTTP status codes are
//! mostly meaningful here, but a 200 body can still carry `status: "ERROR"`
//! or `"NOT_FOUND"`. Prices and volumes are numbers, the change percentage is
//! in percent units, `updated` is Unix milliseconds, and a native batch
//! endpoint accepts a comma-joined ticker list. Authentication is a query
//! parameter by default or a bearer header when `options.auth = "bearer"`.
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
pub const NAME: &str = "polygon";

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct SnapshotEnvelope {
    status: String,
    #[serde(default)]
    ticker: Option<TickerData>,
}

#[derive(Debug, Deserialize)]
struct BatchEnvelope {
    status: String,
    #[serde(default)]
    tickers: Vec<TickerData>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    ticker: String,
    #[serde(rename = "todaysChange")]
    todays_change: f64,
    #[serde(rename = "todaysChangePerc")]
    todays_change_perc: f64,
    /// Unix milliseconds.
    updated: i64,
    day: DayBar,
    #[serde(rename = "prevDay")]
    prev_day: DayBar,
}

#[derive(Debug, Deserialize)]
struct DayBar {
    #[serde(rename = "o")]
    open: f64,
    #[serde(rename = "h")]
    high: f64,
    #[serde(rename = "l")]
    low: f64,
    #[serde(rename = "c")]
    close: f64,
    #[serde(rename = "v")]
    volume: i64,
}

/// Polygon.io provider.
pub struct PolygonProvider {
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
    bearer_auth: bool,
}

impl PolygonProvider {
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
        let bearer_auth = config
            .options
            .get("auth")
            .is_some_and(|mode| mode.eq_ignore_ascii_case("bearer"));
        Self {
            config,
            transport,
            bearer_auth,
        }
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
            latency: DataLatency::Realtime,
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
                Ok(Arc::new(PolygonProvider::new(config)?) as Arc<dyn MarketDataProvider>)
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

    fn request(&self, path_and_query: String) -> HttpRequest {
        let url = format!("{}{}", self.base_url(), path_and_query);
        if self.bearer_auth {
            HttpRequest::get(url).header("Authorization", format!("Bearer {}", self.config.api_key))
        } else {
            let separator = if path_and_query.contains('?') { '&' } else { '?' };
            HttpRequest::get(format!("{url}{separator}apiKey={}", self.config.api_key))
        }
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        operation: Operation,
        path_and_query: String,
    ) -> Result<String, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled(NAME, operation));
        }
        let response = self
            .transport
            .execute(cancel, self.request(path_and_query))
            .await
            .map_err(|e| transport_error(e, operation))?;
        if !response.is_success() {
            return Err(ProviderError::from_status(
                NAME,
                operation,
                response.status,
                truncated(&response.body),
            ));
        }
        Ok(response.body)
    }

    fn normalize_quote(data: &TickerData, operation: Operation) -> Result<Quote, ProviderError> {
        let volume = u64::try_from(data.day.volume).map_err(|_| {
            ProviderError::validation(
                NAME,
                operation,
                format!("negative volume {}", data.day.volume),
            )
        })?;
        let timestamp = normalize::timestamp_from_unix(data.updated).ok_or_else(|| {
            ProviderError::decode(NAME, operation, format!("bad updated value {}", data.updated))
        })?;
        let quote = Quote {
            symbol: data.ticker.trim().to_uppercase(),
            price: data.day.close,
            volume,
            timestamp,
            change: data.todays_change,
            // Vendor reports percent units; canonical form is a fraction.
            change_percent: data.todays_change_perc / 100.0,
            bid: None,
            ask: None,
        };
        quote
            .validate()
            .map_err(|e| ProviderError::validation(NAME, operation, e.to_string()))?;
        Ok(quote)
    }

    fn normalize_snapshot(data: &TickerData, operation: Operation) -> Result<Snapshot, ProviderError> {
        let snapshot = Snapshot {
            quote: Self::normalize_quote(data, operation)?,
            day_open: data.day.open,
            day_high: data.day.high,
            day_low: data.day.low,
            prev_close: data.prev_day.close,
        };
        snapshot
            .validate()
            .map_err(|e| ProviderError::validation(NAME, operation, e.to_string()))?;
        Ok(snapshot)
    }

    async fn fetch_ticker(
        &self,
        cancel: &CancellationToken,
        operation: Operation,
        symbol: &str,
    ) -> Result<TickerData, ProviderError> {
        let body = self
            .execute(
                cancel,
                operation,
                format!("/v2/snapshot/locale/us/markets/stocks/tickers/{symbol}"),
            )
            .await?;
        let envelope: SnapshotEnvelope = serde_json::from_str(&body)
            .map_err(|e| ProviderError::decode(NAME, operation, e.to_string()))?;
        match envelope.status.as_str() {
            "ERROR" => {
                return Err(ProviderError::from_status(
                    NAME,
                    operation,
                    400,
                    format!("vendor status ERROR for {symbol}"),
                ));
            }
            "NOT_FOUND" => {
                return Err(ProviderError::from_status(
                    NAME,
                    operation,
                    404,
                    format!("no snapshot for {symbol}"),
                ));
            }
            _ => {}
        }
        envelope.ticker.ok_or_else(|| {
            ProviderError::from_status(NAME, operation, 404, format!("no snapshot for {symbol}"))
        })
    }
}

#[async_trait]
impl MarketDataProvider for PolygonProvider {
    async fn get_quote(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Quote, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        let data = self
            .fetch_ticker(cancel, Operation::GetQuote, &symbol)
            .await?;
        Self::normalize_quote(&data, Operation::GetQuote)
    }

    /// Native batch via the multi-ticker snapshot endpoint; one request
    /// regardless of batch size. Entries come back keyed by ticker, so the
    /// response is re-mapped onto the input order and gaps become `None`.
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
        let body = self
            .execute(
                cancel,
                Operation::GetQuotes,
                format!(
                    "/v2/snapshot/locale/us/markets/stocks/tickers?tickers={}",
                    upper.join(",")
                ),
            )
            .await?;
        let envelope: BatchEnvelope = serde_json::from_str(&body)
            .map_err(|e| ProviderError::decode(NAME, Operation::GetQuotes, e.to_string()))?;
        if envelope.status == "ERROR" {
            return Err(ProviderError::from_status(
                NAME,
                Operation::GetQuotes,
                400,
                "vendor status ERROR for batch snapshot",
            ));
        }
        let by_ticker: HashMap<String, &TickerData> = envelope
            .tickers
            .iter()
            .map(|t| (t.ticker.trim().to_uppercase(), t))
            .collect();
        Ok(upper
            .iter()
            .map(|symbol| {
                by_ticker
                    .get(symbol)
                    .and_then(|data| Self::normalize_quote(data, Operation::GetQuotes).ok())
            })
            .collect())
    }

    async fn get_snapshot(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        let data = self
            .fetch_ticker(cancel, Operation::GetSnapshot, &symbol)
            .await?;
        Self::normalize_snapshot(&data, Operation::GetSnapshot)
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
