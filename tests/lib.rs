// Test library for resilience behavior tests
pub use finguard_core::{
    api::ProviderApi,
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState},
    classify::{classifier_for, ProviderClassifier},
    error::{ErrorKind, ProviderError},
    provider::{ProviderId, ProviderKey, Region},
    retry::{with_retry, Backoff, RetryConfig},
    transport::RawError,
};
pub use std::sync::Arc;
