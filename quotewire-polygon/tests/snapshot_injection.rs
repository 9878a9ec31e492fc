use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use quotewire_core::config::ProviderConfig;
use quotewire_core::error::ErrorKind;
use quotewire_core::http::{HttpRequest, HttpResponse};
use quotewire_core::provider::MarketDataProvider;
use quotewire_mock::contract;
use quotewire_mock::transport::FakeTransport;
use quotewire_polygon::{NAME, PolygonProvider};

const UPDATED_MS: i64 = 1_699_545_600_000;

fn config() -> ProviderConfig {
    ProviderConfig {
        name: NAME.to_string(),
        api_key: "poly-key".to_string(),
        base_url: None,
        timeout: Duration::from_secs(5),
        options: HashMap::new(),
    }
}

fn ticker_json(symbol: &str) -> String {
    format!(
        r#"{{
            "ticker": "{symbol}",
            "todaysChange": 1.98,
            "todaysChangePerc": 1.12,
            "updated": {UPDATED_MS},
            "day": {{"o": 176.10, "h": 179.30, "l": 175.80, "c": 178.45, "v": 52134567}},
            "prevDay": {{"o": 175.00, "h": 177.10, "l": 174.50, "c": 176.47, "v": 48000000}}
        }}"#
    )
}

fn single_body(symbol: &str) -> String {
    format!(r#"{{"status": "OK", "ticker": {}}}"#, ticker_json(symbol))
}

fn echo_transport() -> Arc<FakeTransport> {
    Arc::new(FakeTransport::from_fn(|request: &HttpRequest| {
        if let Some(rest) = request.url.split("tickers?tickers=").nth(1) {
            let list = rest.split('&').next().unwrap_or_default();
            let tickers: Vec<String> = list.split(',').map(ticker_json).collect();
            return Ok(HttpResponse::ok(format!(
                r#"{{"status": "OK", "tickers": [{}]}}"#,
                tickers.join(",")
            )));
        }
        let symbol = request
            .url
            .split("/tickers/")
            .nth(1)
            .and_then(|rest| rest.split('?').next())
            .unwrap_or("AAPL");
        Ok(HttpResponse::ok(single_body(symbol)))
    }))
}

#[tokio::test]
async fn happy_path_normalizes_numbers_and_millis() {
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(
        single_body("AAPL"),
    )]));
    let provider = PolygonProvider::with_transport(config(), transport.clone());
    let cancel = CancellationToken::new();

    let quote = provider.get_quote(&cancel, "aapl").await.unwrap();
    assert_eq!(quote.symbol, "AAPL");
    assert_eq!(quote.price, 178.45);
    assert_eq!(quote.volume, 52_134_567);
    assert_eq!(quote.timestamp.timestamp(), UPDATED_MS / 1000);
    assert_eq!(quote.change, 1.98);
    assert!((quote.change_percent - 0.0112).abs() < 1e-12);

    let url = &transport.requests()[0].url;
    assert!(url.contains("/v2/snapshot/locale/us/markets/stocks/tickers/AAPL"));
    assert!(url.contains("apiKey=poly-key"));
}

#[tokio::test]
async fn bearer_option_moves_the_key_into_a_header() {
    let mut cfg = config();
    cfg.options.insert("auth".to_string(), "bearer".to_string());
    let transport = echo_transport();
    let provider = PolygonProvider::with_transport(cfg, transport.clone());
    let cancel = CancellationToken::new();

    provider.get_quote(&cancel, "AAPL").await.unwrap();
    let request = &transport.requests()[0];
    assert!(!request.url.contains("apiKey="));
    assert_eq!(
        request.headers,
        vec![("Authorization".to_string(), "Bearer poly-key".to_string())]
    );
}

#[tokio::test]
async fn http_statuses_map_straight_to_the_taxonomy() {
    for (status, retryable) in [(401u16, false), (429, true), (503, true), (404, false)] {
        let transport = Arc::new(FakeTransport::with_responses(vec![
            HttpResponse::with_status(status, "{}"),
        ]));
        let provider = PolygonProvider::with_transport(config(), transport);
        let cancel = CancellationToken::new();

        let err = provider.get_quote(&cancel, "AAPL").await.unwrap_err();
        assert_eq!(err.status, status);
        assert_eq!(err.is_retryable(), retryable, "status {status}");
    }
}

#[tokio::test]
async fn body_status_sentinels_override_the_200() {
    let transport = Arc::new(FakeTransport::with_responses(vec![
        HttpResponse::ok(r#"{"status": "NOT_FOUND"}"#),
        HttpResponse::ok(r#"{"status": "ERROR"}"#),
    ]));
    let provider = PolygonProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "ZZZQ").await.unwrap_err();
    assert_eq!(err.status, 404);

    let err = provider.get_quote(&cancel, "ZZZQ").await.unwrap_err();
    assert_eq!(err.status, 400);
}

#[tokio::test]
async fn native_batch_is_one_request_mapped_back_to_input_order() {
    let transport = Arc::new(FakeTransport::from_fn(|request: &HttpRequest| {
        // The fake vendor knows AAPL and MSFT only.
        let rest = request
            .url
            .split("tickers?tickers=")
            .nth(1)
            .expect("batch endpoint expected");
        let known: Vec<String> = rest
            .split('&')
            .next()
            .unwrap_or_default()
            .split(',')
            .filter(|s| *s == "AAPL" || *s == "MSFT")
            .map(ticker_json)
            .collect();
        Ok(HttpResponse::ok(format!(
            r#"{{"status": "OK", "tickers": [{}]}}"#,
            known.join(",")
        )))
    }));
    let provider = PolygonProvider::with_transport(config(), transport.clone());
    let cancel = CancellationToken::new();

    let symbols: Vec<String> = ["aapl", "INVALID", "msft"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let quotes = provider.get_quotes(&cancel, &symbols).await.unwrap();
    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[0].as_ref().unwrap().symbol, "AAPL");
    assert!(quotes[1].is_none());
    assert_eq!(quotes[2].as_ref().unwrap().symbol, "MSFT");

    assert_eq!(transport.calls(), 1, "native batch must be a single request");
    assert!(transport.requests()[0]
        .url
        .contains("tickers=AAPL,INVALID,MSFT"));
}

#[tokio::test]
async fn batch_top_level_failure_fails_the_call() {
    let transport = Arc::new(FakeTransport::with_responses(vec![
        HttpResponse::with_status(401, "unauthorized"),
    ]));
    let provider = PolygonProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let symbols: Vec<String> = ["AAPL", "MSFT"].iter().map(ToString::to_string).collect();
    let err = provider.get_quotes(&cancel, &symbols).await.unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn empty_batch_is_free() {
    let transport = echo_transport();
    let provider = PolygonProvider::with_transport(config(), transport.clone());
    let cancel = CancellationToken::new();

    let quotes = provider.get_quotes(&cancel, &[]).await.unwrap();
    assert!(quotes.is_empty());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn snapshot_uses_day_and_prev_day_bars() {
    let provider = PolygonProvider::with_transport(config(), echo_transport());
    let cancel = CancellationToken::new();

    let snapshot = provider.get_snapshot(&cancel, "AAPL").await.unwrap();
    assert_eq!(snapshot.day_open, 176.10);
    assert_eq!(snapshot.day_high, 179.30);
    assert_eq!(snapshot.day_low, 175.80);
    assert_eq!(snapshot.prev_close, 176.47);
    snapshot.validate().unwrap();
}

#[tokio::test]
async fn validation_gate_rejects_zero_close() {
    let body = single_body("AAPL").replace(r#""c": 178.45"#, r#""c": 0.0"#);
    let transport = Arc::new(FakeTransport::with_responses(vec![HttpResponse::ok(body)]));
    let provider = PolygonProvider::with_transport(config(), transport);
    let cancel = CancellationToken::new();

    let err = provider.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Validation(_)));
}

#[tokio::test]
async fn cancelled_handle_short_circuits_without_io() {
    let transport = echo_transport();
    let provider = PolygonProvider::with_transport(config(), transport.clone());

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = provider.get_quote(&cancelled, "AAPL").await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(transport.calls(), 0);
}

#[test]
fn descriptor_matches_the_registry_identity() {
    let descriptor = PolygonProvider::descriptor();
    assert_eq!(descriptor.name, NAME);
    assert!(descriptor.supports_batch);
}

#[tokio::test]
async fn adapter_satisfies_the_contract() {
    let provider = PolygonProvider::with_transport(config(), echo_transport());
    contract::assert_provider_contract(&provider).await;
}
