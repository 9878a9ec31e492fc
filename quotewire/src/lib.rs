//! quotewire
//!
//! Umbrella crate for the quotewire provider fabric. Re-exports the core
//! contract and the middleware builder, registers the built-in vendor
//! adapters, and provides the startup [`bootstrap`] path that turns a
//! validated configuration into a health-checked, fully composed provider.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use quotewire::MarketDataProvider;
//!
//! quotewire::register_builtin_providers()?;
//! let config: quotewire::StackConfig = serde_yaml_value_from_your_loader()?;
//! let provider = quotewire::bootstrap::build(config).await?;
//! let cancel = tokio_util::sync::CancellationToken::new();
//! let quote = provider.get_quote(&cancel, "AAPL").await?;
//! # Ok(()) }
//! # fn serde_yaml_value_from_your_loader() -> Result<quotewire::StackConfig, Box<dyn std::error::Error>> { unimplemented!() }
//! ```
#![warn(missing_docs)]

use std::sync::Once;

/// Startup composition: validate, instantiate, wrap, health-check.
pub mod bootstrap;

pub use quotewire_core::{
    CircuitBreakerConfig, ConfigError, DataLatency, ErrorKind, MarketDataProvider, Operation,
    ProviderConfig, ProviderDescriptor, ProviderError, Quote, RateLimitConfig, RateLimitSpec,
    RateLimitStrategy, RetryConfig, Snapshot, StackConfig, ValidationError, registry,
};
pub use quotewire_middleware::{
    CircuitBreakerProvider, CircuitState, ObservedProvider, ProviderBuilder, RateLimitedProvider,
    RateLimiter, RetryProvider, TokenBucket, health_check_with_deadline,
};

pub use quotewire_alphavantage::AlphaVantageProvider;
pub use quotewire_fmp::FmpProvider;
pub use quotewire_polygon::PolygonProvider;

static REGISTER_BUILTINS: Once = Once::new();

/// Register every built-in adapter with the registry.
///
/// One-shot: subsequent calls are no-ops, so hosts and tests may call this
/// freely before config load.
///
/// # Errors
/// Fails only if another crate already claimed one of the built-in names.
pub fn register_builtin_providers() -> Result<(), registry::RegistryError> {
    let mut outcome = Ok(());
    REGISTER_BUILTINS.call_once(|| {
        outcome = try_register_builtins();
    });
    outcome
}

fn try_register_builtins() -> Result<(), registry::RegistryError> {
    AlphaVantageProvider::register()?;
    PolygonProvider::register()?;
    FmpProvider::register()?;
    Ok(())
}
