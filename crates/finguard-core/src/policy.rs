use std::time::Duration;

use crate::{Backoff, ProviderId, RetryConfig, TimeoutConfig};

/// Per-provider tuning: call deadline, retry backoff, and local quota.
///
/// Policies are immutable value objects built once per call site; they
/// never read the environment themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider: ProviderId,
    /// Deadline applied to each call attempt.
    pub call_timeout: Duration,
    /// Local courtesy-quota window.
    pub quota_window: Duration,
    /// Calls allowed per window before the throttle pushes back.
    pub quota_limit: u32,
    pub retry_backoff: BackoffPolicy,
}

/// Retry tuning carried by a provider policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
    pub max_retries: u32,
}

impl ProviderPolicy {
    /// Plaid syncs are slow and institution-bound: generous deadline,
    /// patient backoff.
    pub fn plaid_default() -> Self {
        Self {
            provider: ProviderId::Plaid,
            call_timeout: Duration::from_secs(10),
            quota_window: Duration::from_secs(60),
            quota_limit: 30,
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
                multiplier: 2.0,
                jitter: 0.25,
                max_retries: 3,
            },
        }
    }

    pub fn coinbase_default() -> Self {
        Self {
            provider: ProviderId::Coinbase,
            call_timeout: Duration::from_secs(5),
            quota_window: Duration::from_secs(60),
            quota_limit: 100,
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
                jitter: 0.2,
                max_retries: 3,
            },
        }
    }

    /// Stripe calls carry money movement; retries default off and are
    /// opted into per operation.
    pub fn stripe_default() -> Self {
        Self {
            provider: ProviderId::Stripe,
            call_timeout: Duration::from_secs(15),
            quota_window: Duration::from_secs(1),
            quota_limit: 25,
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(10),
                multiplier: 2.0,
                jitter: 0.2,
                max_retries: 0,
            },
        }
    }

    pub fn default_for(provider: ProviderId) -> Self {
        match provider {
            ProviderId::Plaid => Self::plaid_default(),
            ProviderId::Coinbase => Self::coinbase_default(),
            ProviderId::Stripe => Self::stripe_default(),
        }
    }

    /// Retry configuration derived from this policy's backoff tuning.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_backoff.max_retries,
            backoff: Backoff::Exponential {
                base: self.retry_backoff.initial_delay,
                factor: self.retry_backoff.multiplier,
                max: self.retry_backoff.max_delay,
                jitter: self.retry_backoff.jitter,
            },
            ..RetryConfig::default()
        }
    }

    pub fn timeout_config(&self, operation: impl Into<String>) -> TimeoutConfig {
        TimeoutConfig::new(operation, self.call_timeout)
    }
}
