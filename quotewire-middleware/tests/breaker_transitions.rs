use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quotewire_core::config::CircuitBreakerConfig;
use quotewire_core::error::{Operation, ProviderError};
use quotewire_core::model::{Quote, Snapshot};
use quotewire_core::provider::MarketDataProvider;
use quotewire_middleware::{CircuitBreakerProvider, CircuitState};
use quotewire_mock::MockProvider;

fn breaker_config(max_failures: u32, reset_timeout: Duration) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        enabled: true,
        max_failures,
        reset_timeout,
    }
}

fn transient() -> ProviderError {
    ProviderError::from_status("mock", Operation::GetQuote, 503, "maintenance")
}

#[tokio::test]
async fn trips_after_consecutive_transient_failures() {
    let mock = Arc::new(MockProvider::new());
    mock.fail_times(10, &transient());
    let breaker =
        CircuitBreakerProvider::new(mock.clone(), breaker_config(3, Duration::from_secs(60)));

    let cancel = CancellationToken::new();
    for _ in 0..3 {
        let err = breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
        assert_eq!(err.status, 503);
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let err = breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(mock.calls(), 3, "an open circuit must not touch the inner");
}

#[tokio::test]
async fn auth_failures_do_not_feed_the_counter() {
    let mock = Arc::new(MockProvider::new());
    let auth = ProviderError::from_status("mock", Operation::GetQuote, 401, "invalid api key");
    mock.fail_times(5, &auth);
    let breaker =
        CircuitBreakerProvider::new(mock.clone(), breaker_config(2, Duration::from_secs(60)));

    let cancel = CancellationToken::new();
    for _ in 0..5 {
        let err = breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
        assert!(err.is_auth(), "the auth error must pass through untouched");
    }
    assert_eq!(breaker.state(), CircuitState::Closed);

    // Fixtures take over: the circuit never opened.
    breaker.get_quote(&cancel, "AAPL").await.unwrap();
    assert_eq!(mock.calls(), 6);
}

#[tokio::test]
async fn success_resets_the_counter() {
    let mock = Arc::new(MockProvider::new());
    let breaker =
        CircuitBreakerProvider::new(mock.clone(), breaker_config(2, Duration::from_secs(60)));
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        mock.push_error(transient());
        breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
        // Interleaved success keeps the consecutive count below the threshold.
        breaker.get_quote(&cancel, "AAPL").await.unwrap();
    }
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn probe_closes_circuit_after_recovery() {
    let mock = Arc::new(MockProvider::new());
    mock.fail_times(2, &transient());
    let breaker =
        CircuitBreakerProvider::new(mock.clone(), breaker_config(2, Duration::from_millis(50)));
    let cancel = CancellationToken::new();

    breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);

    // Before the reset timeout: rejected without touching the inner.
    let err = breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(mock.calls(), 2);

    tokio::time::sleep(Duration::from_millis(70)).await;

    // After the timeout the probe goes through; the fixture succeeds.
    breaker.get_quote(&cancel, "AAPL").await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn failed_probe_reopens_and_restarts_the_timer() {
    let mock = Arc::new(MockProvider::new());
    mock.fail_times(3, &transient());
    let breaker =
        CircuitBreakerProvider::new(mock.clone(), breaker_config(2, Duration::from_millis(50)));
    let cancel = CancellationToken::new();

    breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(70)).await;

    // The probe consumes the third scripted failure.
    let err = breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert_eq!(err.status, 503);
    assert_eq!(breaker.state(), CircuitState::Open);

    // Timer restarted: an immediate call is rejected again.
    let err = breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn forced_reset_returns_to_closed() {
    let mock = Arc::new(MockProvider::new());
    mock.fail_times(2, &transient());
    let breaker =
        CircuitBreakerProvider::new(mock.clone(), breaker_config(2, Duration::from_secs(60)));
    let cancel = CancellationToken::new();

    breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);

    breaker.reset();
    assert_eq!(breaker.state(), CircuitState::Closed);
    breaker.get_quote(&cancel, "AAPL").await.unwrap();
}

/// Inner provider that takes a while, so a probe can be observed in flight.
struct SlowProvider {
    delay: Duration,
}

#[async_trait]
impl MarketDataProvider for SlowProvider {
    async fn get_quote(
        &self,
        _cancel: &CancellationToken,
        _symbol: &str,
    ) -> Result<Quote, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Err(ProviderError::from_status(
            "slow",
            Operation::GetQuote,
            503,
            "still down",
        ))
    }
    async fn get_quotes(
        &self,
        _cancel: &CancellationToken,
        _symbols: &[String],
    ) -> Result<Vec<Option<Quote>>, ProviderError> {
        Err(ProviderError::from_status(
            "slow",
            Operation::GetQuotes,
            503,
            "still down",
        ))
    }
    async fn get_snapshot(
        &self,
        _cancel: &CancellationToken,
        _symbol: &str,
    ) -> Result<Snapshot, ProviderError> {
        Err(ProviderError::from_status(
            "slow",
            Operation::GetSnapshot,
            503,
            "still down",
        ))
    }
    fn name(&self) -> &str {
        "slow"
    }
    async fn health_check(&self, _cancel: &CancellationToken) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn only_one_probe_flies_at_a_time() {
    let breaker = Arc::new(CircuitBreakerProvider::new(
        Arc::new(SlowProvider {
            delay: Duration::from_millis(200),
        }),
        breaker_config(1, Duration::from_millis(20)),
    ));
    let cancel = CancellationToken::new();

    // Trip the breaker, then wait out the reset timeout.
    breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert_eq!(breaker.state(), CircuitState::Open);
    tokio::time::sleep(Duration::from_millis(40)).await;

    // First caller becomes the probe and occupies it for ~200ms.
    let probe = {
        let breaker = breaker.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            breaker.get_quote(&cancel, "AAPL").await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // While the probe is in flight, everyone else is rejected.
    let err = breaker.get_quote(&cancel, "AAPL").await.unwrap_err();
    assert!(err.is_circuit_open());

    let probe_result = probe.await.unwrap();
    assert_eq!(probe_result.unwrap_err().status, 503);
    assert_eq!(breaker.state(), CircuitState::Open);
}
