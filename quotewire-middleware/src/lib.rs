//! quotewire-middleware
//!
//! Resilience layers that wrap a [`MarketDataProvider`](quotewire_core::MarketDataProvider)
//! and re-expose the same contract, so the fetch loop never knows whether it
//! holds a raw adapter or a fully composed facade.
//!
//! # Layer ordering
//!
//! The layers form an onion around the raw adapter, and the order is
//! load-bearing:
//!
//! ```text
//! caller
//!   ↓
//! observability   (outermost: attributes retries, waits, and rejections
//!                  to one logical call and reports its cumulative latency)
//!   ↓
//! circuit breaker (sees one outcome per logical call, so recovered retries
//!                  do not trip it)
//!   ↓
//! retry
//!   ↓
//! rate limit      (innermost: every attempt waits for admission, and the
//!                  admission wait itself is never retried as a failure)
//!   ↓
//! raw adapter
//! ```
//!
//! [`ProviderBuilder`] enforces this nesting itself; callers only choose
//! which layers to install, never where they sit.

pub mod breaker;
pub mod builder;
pub mod observe;
pub mod ratelimit;
pub mod retry;

pub use breaker::{CircuitBreakerProvider, CircuitState};
pub use builder::{ProviderBuilder, health_check_with_deadline};
pub use observe::ObservedProvider;
pub use ratelimit::{RateLimitedProvider, RateLimiter, TokenBucket, WaitCancelled};
pub use retry::RetryProvider;
