//! quotewire-core
//!
//! Core types, traits, and utilities shared across the quotewire workspace.
//!
//! - `model`: the canonical quote and snapshot records plus their validation gate.
//! - `normalize`: primitives that parse heterogeneous vendor payloads into canonical shapes.
//! - `error`: the structured provider error with retry semantics.
//! - `provider`: the `MarketDataProvider` contract implemented by adapters and middleware.
//! - `registry`: the process-wide name-to-factory map used to instantiate providers by name.
//! - `http`: the transport seam adapters use so tests can substitute a scripted fake.
//!
//! Async runtime (Tokio)
//! ---------------------
//! This crate assumes the Tokio ecosystem as the async runtime. The contract
//! operations are async and accept a `tokio_util::sync::CancellationToken`;
//! every suspension point in the workspace (HTTP I/O, rate-limit waits, retry
//! backoff) observes that token, so code using the contract must run under a
//! Tokio 1.x runtime.
#![warn(missing_docs)]

/// Configuration types for a provider and its middleware stack.
pub mod config;
/// Static metadata describing a provider's identity and service class.
pub mod descriptor;
/// The structured provider error and its retry classification.
pub mod error;
/// HTTP transport seam used by adapters.
pub mod http;
/// Canonical quote and snapshot records.
pub mod model;
/// Parsers for heterogeneous price/volume/percentage/timestamp encodings.
pub mod normalize;
/// The provider contract.
pub mod provider;
/// Name-to-factory registry.
pub mod registry;

pub use config::{
    CircuitBreakerConfig, ConfigError, ProviderConfig, RateLimitConfig, RateLimitStrategy,
    RetryConfig, StackConfig,
};
pub use descriptor::{DataLatency, ProviderDescriptor, RateLimitSpec};
pub use error::{ErrorKind, Operation, ProviderError};
pub use model::{Quote, Snapshot, ValidationError};
pub use provider::MarketDataProvider;
