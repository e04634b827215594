//! Retry logic with exponential backoff and jitter.

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::{ConfigError, ProviderError, RawError};

/// Retryability verdict carried by the layer's error types.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        self.retryable()
    }
}

impl Retryable for RawError {
    fn is_retryable(&self) -> bool {
        match self.status {
            // 408/429 and server-side failures are worth another attempt;
            // other 4xx statuses mean the request itself is bad.
            Some(status) => matches!(status, 408 | 429) || status >= 500,
            None => true,
        }
    }
}

/// Backoff strategy for retrying failed provider calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`, jittered
    /// by `+/- jitter` (a factor in 0..=1), then capped at `max`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Jitter factor in 0..=1 applied as `delay * (1 + uniform(-j, +j))`.
        jitter: f64,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl Backoff {
    /// Calculate the delay for a given retry attempt (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let mut seconds = base.as_secs_f64() * scale;

                if jitter > 0.0 {
                    let offset = (fastrand::f64() * 2.0 - 1.0) * jitter;
                    seconds *= 1.0 + offset;
                }

                Duration::from_secs_f64(seconds.min(max.as_secs_f64()).max(0.0))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Fixed { .. } => Ok(()),
            Self::Exponential { base, jitter, .. } => {
                if base.is_zero() {
                    return Err(ConfigError::ZeroBaseDelay);
                }
                if !(0.0..=1.0).contains(&jitter) {
                    return Err(ConfigError::InvalidJitter { value: jitter });
                }
                Ok(())
            }
        }
    }
}

/// Observer invoked before each backoff sleep with the retry attempt
/// number (1-based), the failing error's message, and the chosen delay.
pub type OnRetry = Arc<dyn Fn(u32, &str, Duration) + Send + Sync>;

/// Which failures the executor is willing to retry.
#[derive(Clone, Default)]
pub enum RetryOn {
    /// Respect the error's own retryability verdict.
    #[default]
    Verdict,
    /// Retry only errors whose message contains one of these fragments.
    MessageContains(Vec<String>),
    /// Never retry.
    Never,
}

impl fmt::Debug for RetryOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verdict => write!(f, "Verdict"),
            Self::MessageContains(fragments) => {
                write!(f, "MessageContains({fragments:?})")
            }
            Self::Never => write!(f, "Never"),
        }
    }
}

/// Configuration for the automatic retry mechanism.
///
/// Presets supply tuning per operation profile; individual fields are
/// overridden with struct-update syntax:
///
/// ```rust
/// use finguard_core::RetryConfig;
///
/// let config = RetryConfig {
///     max_retries: 1,
///     ..RetryConfig::provider_sync()
/// };
/// assert_eq!(config.max_retries, 1);
/// ```
#[derive(Clone)]
pub struct RetryConfig {
    /// The maximum number of retries to attempt.
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// The backoff strategy to use between retries.
    pub backoff: Backoff,
    /// Which failures are eligible for a retry.
    pub retry_on: RetryOn,
    /// Optional per-retry observer.
    pub on_retry: Option<OnRetry>,
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("retry_on", &self.retry_on)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on: RetryOn::Verdict,
            on_retry: None,
        }
    }
}

impl RetryConfig {
    /// Preset for provider synchronization calls: patient backoff sized
    /// for aggregator latencies.
    pub fn provider_sync() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(1),
                factor: 2.0,
                max: Duration::from_secs(60),
                jitter: 0.25,
            },
            ..Self::default()
        }
    }

    /// Preset for local database operations: quick, short-fused retries.
    pub fn database() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(50),
                factor: 2.0,
                max: Duration::from_secs(1),
                jitter: 0.1,
            },
            ..Self::default()
        }
    }

    /// Preset for payment captures: never retried, so a charge is never
    /// submitted twice.
    pub fn payment() -> Self {
        Self {
            max_retries: 0,
            retry_on: RetryOn::Never,
            ..Self::default()
        }
    }

    /// Disable retries while keeping verdict-based classification.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Attach a per-retry observer.
    pub fn with_on_retry(mut self, hook: OnRetry) -> Self {
        self.on_retry = Some(hook);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backoff.validate()
    }

    fn allows<E: Display>(&self, verdict: bool, error: &E) -> bool {
        match &self.retry_on {
            RetryOn::Verdict => verdict,
            RetryOn::MessageContains(fragments) => {
                let message = error.to_string();
                fragments.iter().any(|fragment| message.contains(fragment))
            }
            RetryOn::Never => false,
        }
    }
}

/// Run `operation` with retries per `config`, consulting the error's own
/// retryability verdict.
///
/// The original error is returned unchanged once attempts are exhausted
/// or the failure is judged non-retryable; this layer never wraps it.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    with_retry_if(config, Retryable::is_retryable, operation).await
}

/// Run `operation` with retries, with `is_retryable` supplying the
/// verdict instead of the error type itself.
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= config.max_retries || !config.allows(is_retryable(&error), &error) {
                    return Err(error);
                }

                let delay = config.backoff.delay(attempt);
                debug!(
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after failure"
                );
                if let Some(hook) = &config.on_retry {
                    hook(attempt + 1, &error.to_string(), delay);
                }

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
