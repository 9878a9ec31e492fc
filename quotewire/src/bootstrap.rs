//! Startup composition.
//!
//! One call takes the loader's [`StackConfig`] all the way to a usable
//! facade: substitute `${NAME}` references, validate, instantiate the adapter
//! through the registry, wrap it in the middleware stack, and run the health
//! check under the startup deadline. Any failure aborts before anything is
//! partially initialized; the binary is expected to print the error and exit
//! non-zero.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use quotewire_core::config::{ConfigError, StackConfig};
use quotewire_core::error::ProviderError;
use quotewire_core::provider::MarketDataProvider;
use quotewire_core::registry::{self, RegistryError};
use quotewire_middleware::{ProviderBuilder, health_check_with_deadline};

/// Deadline for the startup health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures on the startup path. All of them are fatal to the process.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The configuration is invalid or references unset environment variables.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The configured provider name is unknown or its factory failed.
    #[error("provider instantiation failed: {0}")]
    Registry(#[from] RegistryError),
    /// The composed provider failed its startup health check.
    #[error("startup health check failed: {0}")]
    Health(#[from] ProviderError),
}

/// Build a health-checked provider facade from a loaded configuration.
///
/// # Errors
/// Every failure mode is a [`BootstrapError`]; nothing is retried here
/// beyond what the configured retry layer itself does during the health
/// check.
pub async fn build(
    mut config: StackConfig,
) -> Result<Arc<dyn MarketDataProvider>, BootstrapError> {
    config.provider.resolve_api_key()?;
    config.validate()?;

    let base = registry::create(&config.provider.name, config.provider.clone())?;
    let facade = ProviderBuilder::from_config(base, &config);

    tracing::info!(
        provider = %config.provider.name,
        timeout_s = HEALTH_CHECK_TIMEOUT.as_secs(),
        "running startup health check"
    );
    health_check_with_deadline(facade.as_ref(), HEALTH_CHECK_TIMEOUT).await?;

    Ok(facade)
}
