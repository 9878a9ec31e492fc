//! Startup-path tests: registration, config resolution, and the fail-fast
//! health gate, using mock factories registered under test-only names.

use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use quotewire::bootstrap::{self, BootstrapError};
use quotewire::{
    CircuitBreakerConfig, ConfigError, MarketDataProvider, Operation, ProviderConfig,
    ProviderError, RateLimitConfig, RetryConfig, StackConfig, registry,
};
use quotewire_mock::MockProvider;

static REGISTER_TEST_FACTORIES: Once = Once::new();

fn register_test_factories() {
    REGISTER_TEST_FACTORIES.call_once(|| {
        registry::register(
            "bootmock",
            Arc::new(|_config| {
                Ok(Arc::new(MockProvider::named("bootmock")) as Arc<dyn MarketDataProvider>)
            }),
        )
        .expect("bootmock registration is unique to this binary");

        registry::register(
            "bootsick",
            Arc::new(|_config| {
                let mock = MockProvider::named("bootsick");
                mock.set_health_error(Some(ProviderError::from_status(
                    "bootsick",
                    Operation::HealthCheck,
                    401,
                    "invalid api key",
                )));
                Ok(Arc::new(mock) as Arc<dyn MarketDataProvider>)
            }),
        )
        .expect("bootsick registration is unique to this binary");
    });
}

fn stack_config(name: &str, api_key: &str) -> StackConfig {
    StackConfig {
        provider: ProviderConfig {
            name: name.to_string(),
            api_key: api_key.to_string(),
            base_url: None,
            timeout: Duration::from_secs(5),
            options: HashMap::new(),
        },
        rate_limit: RateLimitConfig::default(),
        retry: RetryConfig {
            enabled: true,
            max_attempts: 2,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(50),
            multiplier: 2.0,
            jitter: false,
        },
        circuit_breaker: CircuitBreakerConfig::default(),
    }
}

#[tokio::test]
async fn builds_and_health_checks_a_registered_provider() {
    register_test_factories();

    let facade = bootstrap::build(stack_config("bootmock", "a-key"))
        .await
        .unwrap();
    assert_eq!(facade.name(), "bootmock");

    let cancel = CancellationToken::new();
    let quote = facade.get_quote(&cancel, "aapl").await.unwrap();
    assert_eq!(quote.symbol, "AAPL");
}

#[tokio::test]
async fn unknown_provider_name_lists_what_is_registered() {
    register_test_factories();

    let err = match bootstrap::build(stack_config("nosuchvendor", "a-key")).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error, got Ok"),
    };
    match err {
        BootstrapError::Registry(registry::RegistryError::Unknown { name, registered }) => {
            assert_eq!(name, "nosuchvendor");
            assert!(registered.contains(&"bootmock".to_string()));
        }
        other => panic!("expected Unknown registry error, got {other}"),
    }
}

#[tokio::test]
async fn health_failure_aborts_startup() {
    register_test_factories();

    let err = match bootstrap::build(stack_config("bootsick", "a-key")).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error, got Ok"),
    };
    match err {
        BootstrapError::Health(provider_err) => assert!(provider_err.is_auth()),
        other => panic!("expected a health failure, got {other}"),
    }
}

#[tokio::test]
async fn api_key_env_substitution_is_applied() {
    register_test_factories();
    std::env::set_var("QUOTEWIRE_BOOT_KEY", "resolved-secret");

    bootstrap::build(stack_config("bootmock", "${QUOTEWIRE_BOOT_KEY}"))
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_env_var_is_fatal() {
    register_test_factories();

    let err = match bootstrap::build(stack_config("bootmock", "${QUOTEWIRE_BOOT_KEY_UNSET}")).await
    {
        Err(e) => e,
        Ok(_) => panic!("expected an error, got Ok"),
    };
    match err {
        BootstrapError::Config(ConfigError::MissingEnvVar { name }) => {
            assert_eq!(name, "QUOTEWIRE_BOOT_KEY_UNSET");
        }
        other => panic!("expected MissingEnvVar, got {other}"),
    }
}

#[tokio::test]
async fn invalid_config_never_reaches_the_registry() {
    register_test_factories();

    let mut config = stack_config("bootmock", "a-key");
    config.retry.multiplier = 0.1;
    let err = match bootstrap::build(config).await {
        Err(e) => e,
        Ok(_) => panic!("expected an error, got Ok"),
    };
    assert!(matches!(
        err,
        BootstrapError::Config(ConfigError::MultiplierTooSmall(_))
    ));
}

#[test]
fn builtin_registration_is_idempotent() {
    quotewire::register_builtin_providers().unwrap();
    quotewire::register_builtin_providers().unwrap();
    for name in ["alphavantage", "polygon", "fmp"] {
        assert!(registry::is_registered(name), "{name} should be registered");
    }
}
