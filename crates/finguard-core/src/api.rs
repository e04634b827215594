//! Composed provider call wrapper.
//!
//! One `ProviderApi` per (provider, region) fronts every outbound call:
//!
//! ```text
//! retry (outer, optional)
//!   └─ breaker check ── open? fail fast with CircuitOpen
//!        └─ local throttle ── exhausted? fail fast with RateLimited
//!             └─ timeout guard (fresh budget per attempt)
//!                  └─ raw call
//!        record outcome, classify on failure
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use crate::classify::{classifier_for, ProviderClassifier};
use crate::{
    with_retry, with_timeout, CircuitBreakerRegistry, ProviderError, ProviderId, ProviderPolicy,
    ProviderThrottle, RawError, Region, RetryConfig, TimeoutConfig, TimeoutError,
};

/// Call-site facing wrapper composing breaker check, timeout guard,
/// outcome recording, and classification for one (provider, region).
///
/// The registry is shared; the wrapper itself is cheap to construct per
/// integration module.
pub struct ProviderApi {
    provider: ProviderId,
    region: Region,
    registry: Arc<CircuitBreakerRegistry>,
    classifier: &'static dyn ProviderClassifier,
    call_timeout: Duration,
    throttle: Option<ProviderThrottle>,
}

impl ProviderApi {
    /// Wrapper with the provider's default policy and no local throttle.
    pub fn new(registry: Arc<CircuitBreakerRegistry>, provider: ProviderId, region: Region) -> Self {
        let policy = ProviderPolicy::default_for(provider);
        Self {
            provider,
            region,
            registry,
            classifier: classifier_for(provider),
            call_timeout: policy.call_timeout,
            throttle: None,
        }
    }

    /// Wrapper tuned by `policy`, including its courtesy throttle.
    pub fn with_policy(
        registry: Arc<CircuitBreakerRegistry>,
        region: Region,
        policy: &ProviderPolicy,
    ) -> Self {
        Self {
            provider: policy.provider,
            region,
            registry,
            classifier: classifier_for(policy.provider),
            call_timeout: policy.call_timeout,
            throttle: Some(ProviderThrottle::from_policy(policy)),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_throttle(mut self, throttle: ProviderThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// One guarded attempt: breaker check, throttle check, timeout-raced
    /// call, outcome recording, classification on failure.
    ///
    /// An open circuit fails fast without invoking `call` and without
    /// counting as a new failure.
    pub async fn call<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        self.guarded(operation, call).await
    }

    /// The full composed stack: retry (outer) → breaker check → timeout
    /// (inner) → raw call → classification, with the breaker given a
    /// chance to change state between attempts.
    pub async fn call_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        retry: &RetryConfig,
        call: F,
    ) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        let call = &call;
        with_retry(retry, move || self.guarded(operation, call)).await
    }

    /// A breaker or throttle rejection returns before `call` is invoked;
    /// the thunk only runs once the attempt is admitted.
    async fn guarded<T, C, Fut>(&self, operation: &str, call: C) -> Result<T, ProviderError>
    where
        C: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        let breaker = self.registry.breaker(self.provider, &self.region);
        if !breaker.allow_request() {
            return Err(ProviderError::circuit_open(breaker.key(), operation));
        }

        if let Some(throttle) = &self.throttle {
            if let Err(wait) = throttle.check() {
                return Err(ProviderError::rate_limited(
                    self.provider,
                    operation,
                    format!("local quota for {} exhausted", self.provider),
                )
                .with_retry_after(wait));
            }
        }

        let call_id = Uuid::new_v4();
        let timeout = TimeoutConfig::new(operation, self.call_timeout);
        let started = Instant::now();
        debug!(
            %call_id,
            provider = %self.provider,
            region = %self.region,
            operation,
            "provider call started"
        );

        match with_timeout(&timeout, call).await {
            Ok(value) => {
                let elapsed = started.elapsed();
                breaker.record_success(elapsed);
                debug!(
                    %call_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "provider call succeeded"
                );
                Ok(value)
            }
            Err(TimeoutError::Elapsed { operation, timeout }) => {
                breaker.record_failure("call timed out");
                let message = format!(
                    "operation '{operation}' timed out after {}ms",
                    timeout.as_millis()
                );
                Err(ProviderError::timeout(self.provider, operation, message))
            }
            Err(TimeoutError::Execution(raw)) => {
                breaker.record_failure(&raw.message);
                Err(self.classifier.classify(&raw, operation))
            }
        }
    }
}
