use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use quotewire_alphavantage::{AlphaVantageProvider, NAME};
use quotewire_core::config::ProviderConfig;
use quotewire_core::error::ErrorKind;
use quotewire_core::http::{HttpRequest, HttpResponse};
use quotewire_core::provider::MarketDataProvider;
use quotewire_mock::contract;
use quotewire_mock::transport::FakeTransport;

fn config() -> ProviderConfig {
    ProviderConfig {
        name: NAME.to_string(),
        api_key: "demo-key".to_string(),
        base_url: None,
        timeout: Duration::from_secs(5),
        options: HashMap::new(),
    }
}

fn global_quote_body(symbol: &str) -> String {
    format!(
        r#"{{"Global Quote": {{
            "01. symbol": "{symbol}",
            "02. open": "157.8500",
            "03. high": "158.9700",
            "04. low": "157.4200",
            "05. price": "158.5400",
            "06. volume": "6640217",
            "07. latest trading day": "2023-11-30",
            "08. previous close": "156.4100",
            "09. change": "2.1300",
            "10. change percent": "1.3618%"
        }}}}"#
    )
}

/// Routes any GLOBAL_QUOTE request to a well-formed payload echoing the
/// requested symbol.
fn echo_transport() -> Arc<FakeTransport> {
    Arc::new(FakeTransport::from_fn(|request: &HttpRequest| {
        let symbol = request
            .url
            .split("symbol=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap_or("AAPL");
        Ok(HttpResponse::ok(global_quote_body(symbol)))
    }))
}

#[tokio::test]
async fn happy_path_normalizes_the_stringly_payload() {
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(
        global_quote_body("IBM"),
    )]));
    let provider = AlphaVantageProvider::with_transport(config(), transport.clone());
    let cancel = CancellationToken::new();

    let quote = provider.get_quote(&cancel, "ibm").await.unwrap();
    assert_eq!(quote.symbol, "IBM");
    assert_eq!(quote.price, 158.54);
    assert_eq!(quote.volume, 6_640_217);
    assert_eq!(
        quote.timestamp,
        Utc.with_ymd_and_hms(2023, 11, 30, 0, 0, 0).unwrap()
    );
    assert_eq!(quote.change, 2.13);
    assert!((quote.change_percent - 0.013_618).abs() < 1e-12);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.contains("function=GLOBAL_QUOTE"));
    assert!(requests[0].url.contains("symbol=IBM"), "lookup must uppercase");
    assert!(requests[0].url.contains("apikey=demo-key"));
}

#[tokio::test]
async fn snapshot_carries_the_day_range() {
    let provider = AlphaVantageProvider::with_transport(config(), echo_transport());
    let cancel = CancellationToken::new();

    let snapshot = provider.get_snapshot(&cancel, "IBM").await.unwrap();
    assert_eq!(snapshot.day_open, 157.85);
    assert_eq!(snapshot.day_high, 158.97);
    assert_eq!(snapshot.day_low, 157.42);
    assert_eq!(snapshot.prev_close, 156.41);
}

#[tokio::test]
async fn note_sentinel_maps_to_rate_limit() {
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(
        r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"}"#,
    )]));
    let provider = AlphaVantageProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "IBM").await.unwrap_err();
    assert_eq!(err.status, 429);
    assert!(err.is_retryable());
    assert!(matches!(err.kind, ErrorKind::RateLimited(_)));
}

#[tokio::test]
async fn error_message_mentioning_the_key_maps_to_auth() {
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(
        r#"{"Error Message": "the parameter apikey is invalid or missing"}"#,
    )]));
    let provider = AlphaVantageProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "IBM").await.unwrap_err();
    assert_eq!(err.status, 401);
    assert!(!err.is_retryable());
    assert!(err.is_auth());
}

#[tokio::test]
async fn other_error_message_maps_to_invalid_request() {
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(
        r#"{"Error Message": "Invalid API call. Please retry or visit the documentation"}"#,
    )]));
    let provider = AlphaVantageProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "IBM").await.unwrap_err();
    assert_eq!(err.status, 400);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn information_sentinel_maps_to_invalid_request() {
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(
        r#"{"Information": "Please consider upgrading to a premium plan"}"#,
    )]));
    let provider = AlphaVantageProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "IBM").await.unwrap_err();
    assert_eq!(err.status, 400);
}

#[tokio::test]
async fn empty_global_quote_maps_to_not_found() {
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(
        r#"{"Global Quote": {}}"#,
    )]));
    let provider = AlphaVantageProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "ZZZQ").await.unwrap_err();
    assert_eq!(err.status, 404);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn validation_gate_rejects_non_positive_price() {
    let body = global_quote_body("IBM").replace("158.5400", "0.0000");
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(body)]));
    let provider = AlphaVantageProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "IBM").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Validation(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn batch_fans_out_sequentially_with_absent_entries() {
    let transport = Arc::new(FakeTransport::from_fn(|request: &HttpRequest| {
        if request.url.contains("symbol=INVALID") {
            Ok(HttpResponse::ok(r#"{"Global Quote": {}}"#))
        } else {
            let symbol = request
                .url
                .split("symbol=")
                .nth(1)
                .and_then(|rest| rest.split('&').next())
                .unwrap_or("AAPL");
            Ok(HttpResponse::ok(global_quote_body(symbol)))
        }
    }));
    let provider = AlphaVantageProvider::with_transport(config(), transport.clone());
    let cancel = CancellationToken::new();

    let symbols: Vec<String> = ["AAPL", "INVALID", "MSFT"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let quotes = provider.get_quotes(&cancel, &symbols).await.unwrap();
    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[0].as_ref().unwrap().symbol, "AAPL");
    assert!(quotes[1].is_none());
    assert_eq!(quotes[2].as_ref().unwrap().symbol, "MSFT");
    assert_eq!(transport.calls(), 3, "one request per symbol, in order");
}

#[tokio::test]
async fn batch_auth_failure_fails_the_whole_call() {
    let transport = Arc::new(FakeTransport::from_fn(|_request: &HttpRequest| {
        Ok(HttpResponse::ok(
            r#"{"Error Message": "the parameter apikey is invalid or missing"}"#,
        ))
    }));
    let provider = AlphaVantageProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let symbols: Vec<String> = ["AAPL", "MSFT"].iter().map(ToString::to_string).collect();
    let err = provider.get_quotes(&cancel, &symbols).await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn cancelled_handle_short_circuits_without_io() {
    let transport = echo_transport();
    let provider = AlphaVantageProvider::with_transport(config(), transport.clone());

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = provider.get_quote(&cancelled, "AAPL").await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn custom_base_url_trailing_slash_is_tolerated() {
    let mut cfg = config();
    cfg.base_url = Some("https://proxy.example.com/".to_string());
    let transport = echo_transport();
    let provider = AlphaVantageProvider::with_transport(cfg, transport.clone());
    let cancel = CancellationToken::new();

    provider.get_quote(&cancel, "AAPL").await.unwrap();
    assert!(transport.requests()[0]
        .url
        .starts_with("https://proxy.example.com/query?"));
}

#[test]
fn descriptor_matches_the_registry_identity() {
    let descriptor = AlphaVantageProvider::descriptor();
    assert_eq!(descriptor.name, NAME);
    assert!(!descriptor.supports_batch);
    assert!(descriptor.rate_limit.max_requests > 0);
}

#[tokio::test]
async fn adapter_satisfies_the_contract() {
    let provider = AlphaVantageProvider::with_transport(config(), echo_transport());
    contract::assert_provider_contract(&provider).await;
}
