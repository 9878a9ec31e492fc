//! Black-box conformance suite for any provider implementation.
//!
//! Run it from an adapter's test crate against an instance wired to fixtures
//! that can serve AAPL, MSFT, and GOOGL:
//!
//! ```ignore
//! #[tokio::test]
//! async fn adapter_satisfies_contract() {
//!     let provider = build_provider_with_fixtures();
//!     quotewire_mock::contract::assert_provider_contract(&provider).await;
//! }
//! ```

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use quotewire_core::provider::MarketDataProvider;

/// Deadline the startup path grants a health check.
const HEALTH_CHECK_DEADLINE: Duration = Duration::from_secs(10);

/// Exercise every universal invariant of the provider contract, panicking
/// with a descriptive message on the first violation.
///
/// The provider must be able to serve AAPL, MSFT, and GOOGL.
///
/// # Panics
/// On any contract violation.
pub async fn assert_provider_contract(provider: &dyn MarketDataProvider) {
    let cancel = CancellationToken::new();

    // get_quote: case-insensitive input, canonical output.
    let quote = provider
        .get_quote(&cancel, "aapl")
        .await
        .expect("get_quote must succeed for a known symbol");
    assert_eq!(quote.symbol, "AAPL", "symbol must be uppercased");
    assert!(quote.price > 0.0, "price must be positive");
    assert!(quote.volume > 0, "fixture volume must be populated");
    assert!(
        quote.timestamp <= Utc::now(),
        "timestamp must not be in the future"
    );
    assert!(
        quote.change_percent.abs() < 10.0,
        "change_percent must be a decimal fraction, got {}",
        quote.change_percent
    );
    quote
        .validate()
        .expect("returned quote must pass the validation gate");

    // get_quotes: same length and order as the input.
    let symbols: Vec<String> = ["AAPL", "MSFT", "GOOGL"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let quotes = provider
        .get_quotes(&cancel, &symbols)
        .await
        .expect("get_quotes must succeed for known symbols");
    assert_eq!(quotes.len(), symbols.len(), "batch length must match input");
    for (i, entry) in quotes.iter().enumerate() {
        if let Some(quote) = entry {
            assert_eq!(
                quote.symbol,
                symbols[i].to_uppercase(),
                "batch entry {i} must match input order"
            );
            quote
                .validate()
                .expect("batch entries must pass the validation gate");
        }
    }

    // Empty batch: empty sequence, no error, no drama.
    let empty = provider
        .get_quotes(&cancel, &[])
        .await
        .expect("empty batch must not error");
    assert!(empty.is_empty(), "empty input must yield an empty sequence");

    // name(): lowercase alphanumeric, stable across calls.
    let name = provider.name().to_string();
    assert!(!name.is_empty(), "name must not be empty");
    assert!(
        name.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()),
        "name must be lowercase alphanumeric, got {name:?}"
    );
    assert_eq!(provider.name(), name, "name must be stable across calls");

    // Snapshot invariants.
    let snapshot = provider
        .get_snapshot(&cancel, "aapl")
        .await
        .expect("get_snapshot must succeed for a known symbol");
    assert_eq!(snapshot.quote.symbol, "AAPL");
    snapshot
        .validate()
        .expect("returned snapshot must pass the validation gate");

    // An already-cancelled handle short-circuits with a cancellation error.
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = provider
        .get_quote(&cancelled, "AAPL")
        .await
        .expect_err("cancelled handle must not produce a quote");
    assert!(err.is_cancelled(), "expected a cancellation error, got {err}");
    assert!(!err.is_retryable(), "cancellation must not be retryable");

    // health_check completes within the startup deadline.
    let health_cancel = CancellationToken::new();
    let guard = health_cancel.clone();
    let timer = tokio::spawn(async move {
        tokio::time::sleep(HEALTH_CHECK_DEADLINE).await;
        guard.cancel();
    });
    provider
        .health_check(&health_cancel)
        .await
        .expect("health check must pass against working fixtures");
    timer.abort();
}
