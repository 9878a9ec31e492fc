//! Static metadata describing a provider's identity and service class.

use std::time::Duration;

use crate::config::RateLimitStrategy;

/// How fresh a provider's data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DataLatency {
    /// Live exchange data.
    Realtime,
    /// Delayed by the vendor (typically 15 minutes).
    Delayed,
    /// End-of-day data only.
    EndOfDay,
}

/// The rate-limit regime a vendor plan imposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSpec {
    /// Requests permitted per window.
    pub max_requests: u32,
    /// The window those requests accrue over.
    pub window: Duration,
    /// Admission strategy appropriate for this regime.
    pub strategy: RateLimitStrategy,
}

/// Identity and service characteristics of a provider, fixed at compile time.
///
/// Descriptors let the host pick sensible middleware defaults for a vendor
/// without hard-coding vendor knowledge outside its adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Stable lowercase alphanumeric identifier; the registry key.
    pub name: &'static str,
    /// Vendor plan label the descriptor reflects (e.g. "free").
    pub tier: &'static str,
    /// Rate-limit regime of that plan.
    pub rate_limit: RateLimitSpec,
    /// Data freshness class.
    pub latency: DataLatency,
    /// Whether the vendor exposes a native batch quote endpoint.
    pub supports_batch: bool,
}
