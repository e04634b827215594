use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProviderId, ProviderKey};

/// Validation errors for resilience configuration values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid provider '{value}', expected one of plaid, coinbase, stripe")]
    InvalidProvider { value: String },
    #[error("region must be 1-8 lowercase ASCII characters: '{value}'")]
    InvalidRegion { value: String },
    #[error("jitter factor must be within 0.0..=1.0: {value}")]
    InvalidJitter { value: f64 },
    #[error("backoff base delay must be greater than zero")]
    ZeroBaseDelay,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Failure classification for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credentials rejected; requires user re-authentication.
    AuthFailed,
    /// Provider rate limit hit, locally or upstream.
    RateLimited,
    /// Provider outage, maintenance, or network-level failure.
    Unavailable,
    /// The call did not settle within its deadline.
    Timeout,
    /// Fast-failed because the circuit for this key is open.
    CircuitOpen,
    /// Unmatched provider failure.
    SyncFailed,
}

/// Structured provider error produced by classification and breaker checks.
///
/// Retryability is assigned once, here; the retry executor only consults
/// the verdict and never re-wraps the error.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    kind: ErrorKind,
    provider: ProviderId,
    operation: String,
    message: String,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn auth_failed(
        provider: ProviderId,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::AuthFailed,
            provider,
            operation: operation.into(),
            message: message.into(),
            retryable: false,
            retry_after: None,
        }
    }

    pub fn rate_limited(
        provider: ProviderId,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            provider,
            operation: operation.into(),
            message: message.into(),
            retryable: true,
            retry_after: None,
        }
    }

    pub fn unavailable(
        provider: ProviderId,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Unavailable,
            provider,
            operation: operation.into(),
            message: message.into(),
            retryable: true,
            retry_after: None,
        }
    }

    pub fn timeout(
        provider: ProviderId,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            provider,
            operation: operation.into(),
            message: message.into(),
            retryable: true,
            retry_after: None,
        }
    }

    /// Fast failure for an open circuit. Retryable: an outer retry loop
    /// backs off first, and the circuit may admit a probe by then.
    pub fn circuit_open(key: &ProviderKey, operation: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::CircuitOpen,
            provider: key.provider,
            operation: operation.into(),
            message: format!("circuit for {key} is open; failing fast"),
            retryable: true,
            retry_after: None,
        }
    }

    pub fn sync_failed(
        provider: ProviderId,
        operation: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            kind: ErrorKind::SyncFailed,
            provider,
            operation: operation.into(),
            message: message.into(),
            retryable,
            retry_after: None,
        }
    }

    /// Attach the provider's wait hint, usually from a `Retry-After` header.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::AuthFailed => "provider.auth_failed",
            ErrorKind::RateLimited => "provider.rate_limited",
            ErrorKind::Unavailable => "provider.unavailable",
            ErrorKind::Timeout => "provider.timeout",
            ErrorKind::CircuitOpen => "provider.circuit_open",
            ErrorKind::SyncFailed => "provider.sync_failed",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}/{}] ({})",
            self.message,
            self.provider,
            self.operation,
            self.code()
        )
    }
}

impl std::error::Error for ProviderError {}
