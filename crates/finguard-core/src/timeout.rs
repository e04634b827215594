//! Timeout guard for provider calls.
//!
//! The guard wraps only the innermost raw call, so each retry attempt
//! gets a fresh deadline rather than sharing one global budget.

use std::fmt::{self, Display};
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::ConfigError;

/// Deadline applied to a single provider call attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Operation name carried into timeout diagnostics.
    pub operation: String,
    pub timeout: Duration,
}

impl TimeoutConfig {
    pub fn new(operation: impl Into<String>, timeout: Duration) -> Self {
        Self {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Outcome of a timed call that did not produce a value.
#[derive(Debug)]
pub enum TimeoutError<E> {
    /// The deadline elapsed before the operation settled.
    Elapsed { operation: String, timeout: Duration },
    /// The operation settled first, with an error.
    Execution(E),
}

impl<E: Display> Display for TimeoutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elapsed { operation, timeout } => write!(
                f,
                "operation '{operation}' timed out after {}ms",
                timeout.as_millis()
            ),
            Self::Execution(error) => write!(f, "{error}"),
        }
    }
}

impl<E: fmt::Debug + Display> std::error::Error for TimeoutError<E> {}

/// Race `operation` against the configured deadline.
///
/// Exactly one outcome is produced: the value, the operation's own
/// error, or an elapsed deadline. When the deadline wins, the in-flight
/// future is dropped and cancelled at its next await point; work the
/// provider already accepted server-side is not aborted.
pub async fn with_timeout<T, E, F, Fut>(
    config: &TimeoutConfig,
    operation: F,
) -> Result<T, TimeoutError<E>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(config.timeout, operation()).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(TimeoutError::Execution(error)),
        Err(_) => {
            warn!(
                operation = %config.operation,
                timeout_ms = config.timeout.as_millis() as u64,
                "provider call timed out"
            );
            Err(TimeoutError::Elapsed {
                operation: config.operation.clone(),
                timeout: config.timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_when_operation_settles_first() {
        let config = TimeoutConfig::new("fast_op", Duration::from_secs(1));

        let result: Result<u32, TimeoutError<&str>> =
            with_timeout(&config, || async { Ok(42) }).await;

        assert_eq!(result.expect("settles before deadline"), 42);
    }

    #[tokio::test]
    async fn propagates_the_operation_error_unchanged() {
        let config = TimeoutConfig::new("failing_op", Duration::from_secs(1));

        let result: Result<u32, TimeoutError<&str>> =
            with_timeout(&config, || async { Err("boom") }).await;

        assert!(matches!(result, Err(TimeoutError::Execution("boom"))));
    }

    #[tokio::test]
    async fn rejects_with_elapsed_when_deadline_wins() {
        let config = TimeoutConfig::new("slow_op", Duration::from_millis(10));

        let result: Result<u32, TimeoutError<&str>> = with_timeout(&config, || async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(42)
        })
        .await;

        match result {
            Err(TimeoutError::Elapsed { operation, timeout }) => {
                assert_eq!(operation, "slow_op");
                assert_eq!(timeout, Duration::from_millis(10));
            }
            other => panic!("expected elapsed deadline, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = TimeoutConfig::new("op", Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTimeout)));
    }
}
