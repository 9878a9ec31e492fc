//! Process-wide name-to-factory registry.
//!
//! Registration is a one-shot initialization event per adapter: Rust has no
//! module-init hooks, so the host crate registers every built-in adapter
//! explicitly before config load. The map is read often and written rarely;
//! a reader-preferring lock suffices.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

use thiserror::Error;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::provider::MarketDataProvider;

/// A factory that builds a provider from its configuration.
pub type ProviderFactory =
    Arc<dyn Fn(ProviderConfig) -> Result<Arc<dyn MarketDataProvider>, ProviderError> + Send + Sync>;

static REGISTRY: LazyLock<RwLock<HashMap<String, ProviderFactory>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Registry failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A factory was already registered under this name. Registration never
    /// silently overwrites.
    #[error("provider {name:?} is already registered")]
    Duplicate {
        /// The contested name.
        name: String,
    },
    /// The name is not a lowercase alphanumeric identifier.
    #[error("provider name {name:?} must be non-empty lowercase alphanumeric")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
    /// No factory is registered under this name.
    #[error("provider {name:?} not registered (available: {registered:?})")]
    Unknown {
        /// The requested name.
        name: String,
        /// Names that are registered, for the error message.
        registered: Vec<String>,
    },
    /// The factory itself failed to build the provider.
    #[error(transparent)]
    Factory(#[from] ProviderError),
}

/// Register a provider factory under a name.
///
/// # Errors
/// Rejects names that are not lowercase alphanumeric and names that are
/// already taken.
pub fn register(name: &str, factory: ProviderFactory) -> Result<(), RegistryError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
        });
    }
    let mut map = REGISTRY.write().expect("registry lock poisoned");
    if map.contains_key(name) {
        return Err(RegistryError::Duplicate {
            name: name.to_string(),
        });
    }
    map.insert(name.to_string(), factory);
    Ok(())
}

/// Instantiate a provider by registered name.
///
/// # Errors
/// [`RegistryError::Unknown`] (listing registered names) when nothing is
/// registered under `name`; the factory's own error otherwise.
pub fn create(
    name: &str,
    config: ProviderConfig,
) -> Result<Arc<dyn MarketDataProvider>, RegistryError> {
    let factory = {
        let map = REGISTRY.read().expect("registry lock poisoned");
        map.get(name).cloned()
    };
    match factory {
        Some(factory) => Ok(factory(config)?),
        None => Err(RegistryError::Unknown {
            name: name.to_string(),
            registered: registered_names(),
        }),
    }
}

/// Names currently registered, sorted for stable output.
#[must_use]
pub fn registered_names() -> Vec<String> {
    let map = REGISTRY.read().expect("registry lock poisoned");
    let mut names: Vec<String> = map.keys().cloned().collect();
    names.sort();
    names
}

/// Whether a factory is registered under `name`.
#[must_use]
pub fn is_registered(name: &str) -> bool {
    REGISTRY
        .read()
        .expect("registry lock poisoned")
        .contains_key(name)
}
