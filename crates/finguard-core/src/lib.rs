//! # Finguard Core
//!
//! Resilience layer fronting every outbound call to third-party
//! financial providers in the finguard platform.
//!
//! ## Overview
//!
//! This crate provides the components that keep the system alive when
//! external provider APIs are slow, flaky, rate-limiting, or down,
//! without masking genuinely fatal errors behind endless retries:
//!
//! - **Circuit breaker** keyed by (provider, region) with sliding-window
//!   failure counting and growing cooldowns
//! - **Retry executor** with exponential backoff, jitter, and presets
//! - **Timeout guard** giving each call attempt a fresh deadline
//! - **Error classifiers**, one per provider envelope, normalizing raw
//!   failures into a single structured error with a retryability verdict
//! - **Provider API wrapper** composing the full stack per call site
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Composed provider call wrapper |
//! | [`circuit_breaker`] | Per-(provider, region) health state machine |
//! | [`classify`] | Per-provider error classifiers (Plaid, Coinbase, Stripe) |
//! | [`error`] | Structured provider errors and config validation |
//! | [`policy`] | Per-provider tuning presets |
//! | [`provider`] | Provider and region identifiers |
//! | [`retry`] | Backoff strategies and the retry executor |
//! | [`throttle`] | In-process courtesy quota per provider |
//! | [`timeout`] | Deadline guard for single call attempts |
//! | [`transport`] | Raw failure shape handed to classification |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use finguard_core::{
//!     CircuitBreakerRegistry, ProviderApi, ProviderId, RawError, Region, RetryConfig,
//! };
//!
//! # async fn example() -> Result<(), finguard_core::ProviderError> {
//! // One registry per process, shared by every integration.
//! let registry = Arc::new(CircuitBreakerRegistry::default());
//!
//! let plaid = ProviderApi::new(
//!     Arc::clone(&registry),
//!     ProviderId::Plaid,
//!     Region::parse("us")?,
//! );
//!
//! let accounts = plaid
//!     .call_with_retry("transactions_sync", &RetryConfig::provider_sync(), || async {
//!         // the integration owns the actual HTTP call
//!         run_sync_request().await.map_err(RawError::from)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure surfaces as a [`ProviderError`] with a typed kind:
//!
//! ```rust
//! use finguard_core::{ErrorKind, ProviderError};
//!
//! fn handle_error(error: ProviderError) {
//!     match error.kind() {
//!         ErrorKind::AuthFailed => {
//!             // Prompt the user to re-authenticate; never auto-retried.
//!         }
//!         ErrorKind::RateLimited => {
//!             // Honor error.retry_after() before the next sync.
//!         }
//!         ErrorKind::CircuitOpen => {
//!             // Dependency is unhealthy; serve cached data.
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Concurrency
//!
//! Breaker state is process-wide and mutex-guarded per key; success and
//! failure recording apply atomically relative to each other. In a
//! horizontally scaled deployment each process holds its own view of
//! provider health — an eventual-consistency approximation, not a bug.

pub mod api;
pub mod circuit_breaker;
pub mod classify;
pub mod error;
pub mod policy;
pub mod provider;
pub mod retry;
pub mod throttle;
pub mod timeout;
pub mod transport;

// Re-export commonly used types at crate root for convenience

// Composed wrapper
pub use api::ProviderApi;

// Circuit breaker
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
};

// Classifiers
pub use classify::{
    classifier_for, CoinbaseClassifier, PlaidClassifier, ProviderClassifier, StripeClassifier,
};

// Error types
pub use error::{ConfigError, ErrorKind, ProviderError};

// Provider policies
pub use policy::{BackoffPolicy, ProviderPolicy};

// Provider identifiers
pub use provider::{ProviderId, ProviderKey, Region};

// Retry logic
pub use retry::{with_retry, with_retry_if, Backoff, OnRetry, RetryConfig, RetryOn, Retryable};

// Throttling
pub use throttle::ProviderThrottle;

// Timeout guard
pub use timeout::{with_timeout, TimeoutConfig, TimeoutError};

// Raw failure shape
pub use transport::RawError;
