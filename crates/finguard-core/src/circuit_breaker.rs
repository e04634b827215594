//! Circuit breaker keyed by (provider, region).
//!
//! State machine:
//!
//! ```text
//! CLOSED --(failures >= threshold in window)--> OPEN
//! OPEN   --(cooldown elapsed)----------------> HALF_OPEN
//! HALF_OPEN --(success_threshold successes)--> CLOSED
//! HALF_OPEN --(any failure)------------------> OPEN (cooldown extended)
//! ```
//!
//! The cooldown doubles on each consecutive trip, capped at
//! `max_cooldown`, and resets once the circuit closes again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{ProviderId, ProviderKey, Region};

/// Runtime circuit state for provider upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures within `failure_window` required to open the circuit.
    pub failure_threshold: u32,
    /// Sliding window over which failures are counted.
    pub failure_window: Duration,
    /// Consecutive half-open successes required to close the circuit.
    pub success_threshold: u32,
    /// Cooldown after the first trip; doubles on each consecutive trip.
    pub base_cooldown: Duration,
    /// Upper bound for the grown cooldown.
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            success_threshold: 3,
            base_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failures: Vec<Instant>,
    consecutive_successes: u32,
    opened_until: Option<Instant>,
    trips: u32,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: Vec::new(),
            consecutive_successes: 0,
            opened_until: None,
            trips: 0,
        }
    }
}

/// Thread-safe circuit breaker for one (provider, region) key.
///
/// `record_success` and `record_failure` apply atomically relative to
/// each other across concurrent calls sharing the key; the inner mutex
/// is held only for the state update, never across an await.
#[derive(Debug)]
pub struct CircuitBreaker {
    key: ProviderKey,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(key: ProviderKey, config: CircuitBreakerConfig) -> Self {
        Self {
            key,
            config,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    pub fn key(&self) -> &ProviderKey {
        &self.key
    }

    /// Whether a call may proceed. An open circuit whose cooldown has
    /// elapsed transitions to half-open and admits the probe.
    pub fn allow_request(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = inner
                    .opened_until
                    .map(|until| Instant::now() >= until)
                    .unwrap_or(true);

                if cooldown_elapsed {
                    debug!(key = %self.key, "circuit half-open, admitting probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    inner.opened_until = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, response_time: Duration) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Closed => {
                inner.failures.clear();
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes = inner.consecutive_successes.saturating_add(1);
                if inner.consecutive_successes >= self.config.success_threshold {
                    info!(
                        key = %self.key,
                        response_time_ms = response_time.as_millis() as u64,
                        "circuit closed after recovery probes"
                    );
                    *inner = CircuitInner::default();
                }
            }
            // A call admitted before the trip can settle after it.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, reason: &str) {
        let now = Instant::now();
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Closed => {
                let window_start = now - self.config.failure_window;
                inner.failures.retain(|&at| at > window_start);
                inner.failures.push(now);

                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    self.trip(&mut inner, now, reason);
                }
            }
            CircuitState::HalfOpen => {
                self.trip(&mut inner, now, reason);
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
            .state
    }

    /// Failures currently inside the sliding window.
    pub fn failure_count(&self) -> u32 {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
            .failures
            .len() as u32
    }

    /// Remaining cooldown while open, `None` otherwise.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Open => inner
                .opened_until
                .map(|until| until.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    fn trip(&self, inner: &mut CircuitInner, now: Instant, reason: &str) {
        inner.trips = inner.trips.saturating_add(1);
        let cooldown = self.cooldown_for_trip(inner.trips);
        warn!(
            key = %self.key,
            failures = inner.failures.len(),
            trips = inner.trips,
            cooldown_ms = cooldown.as_millis() as u64,
            reason,
            "circuit opened"
        );
        inner.state = CircuitState::Open;
        inner.opened_until = Some(now + cooldown);
        inner.failures.clear();
        inner.consecutive_successes = 0;
    }

    fn cooldown_for_trip(&self, trips: u32) -> Duration {
        let exponent = trips.saturating_sub(1).min(16);
        self.config
            .base_cooldown
            .saturating_mul(1u32 << exponent)
            .min(self.config.max_cooldown)
    }
}

/// Process-wide registry of circuit breakers, one per (provider, region).
///
/// Constructed once at startup and passed by reference to every provider
/// integration; tests inject a fresh registry to avoid cross-test state.
/// Breaker state lives for the process lifetime and decays only through
/// window expiry.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<ProviderKey, Arc<CircuitBreaker>>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker for the key, creating it lazily on first use.
    pub fn breaker(&self, provider: ProviderId, region: &Region) -> Arc<CircuitBreaker> {
        let key = ProviderKey::new(provider, region.clone());
        let mut breakers = self
            .breakers
            .lock()
            .expect("breaker registry lock is not poisoned");
        Arc::clone(
            breakers
                .entry(key.clone())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(key, self.config))),
        )
    }

    /// True while the key's circuit refuses calls. An elapsed cooldown
    /// flips the circuit to half-open and returns false so the caller's
    /// probe is admitted.
    pub fn is_circuit_open(&self, provider: ProviderId, region: &Region) -> bool {
        !self.breaker(provider, region).allow_request()
    }

    pub fn record_success(&self, provider: ProviderId, region: &Region, response_time: Duration) {
        self.breaker(provider, region).record_success(response_time);
    }

    pub fn record_failure(&self, provider: ProviderId, region: &Region, reason: &str) {
        self.breaker(provider, region).record_failure(reason);
    }

    /// Snapshot of every live key's state, for diagnostics surfaces.
    pub fn states(&self) -> Vec<(ProviderKey, CircuitState)> {
        let breakers = self
            .breakers
            .lock()
            .expect("breaker registry lock is not poisoned");
        breakers
            .values()
            .map(|breaker| (breaker.key().clone(), breaker.state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> ProviderKey {
        ProviderKey::new(ProviderId::Plaid, Region::parse("us").expect("valid"))
    }

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            failure_window: Duration::from_secs(60),
            success_threshold: 2,
            base_cooldown: Duration::from_millis(20),
            max_cooldown: Duration::from_millis(160),
        }
    }

    #[test]
    fn opens_after_threshold_failures_in_window() {
        let breaker = CircuitBreaker::new(test_key(), fast_config());

        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure("boom");
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure("boom");
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn success_in_closed_state_clears_the_window() {
        let breaker = CircuitBreaker::new(test_key(), fast_config());

        breaker.record_failure("boom");
        assert_eq!(breaker.failure_count(), 1);
        breaker.record_success(Duration::from_millis(12));
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn transitions_to_half_open_then_closes_after_probes() {
        let breaker = CircuitBreaker::new(test_key(), fast_config());

        breaker.record_failure("boom");
        breaker.record_failure("boom");
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success(Duration::from_millis(5));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success(Duration::from_millis(5));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn failure_while_half_open_reopens_with_longer_cooldown() {
        let breaker = CircuitBreaker::new(test_key(), fast_config());

        breaker.record_failure("boom");
        breaker.record_failure("boom");
        let first = breaker.cooldown_remaining().expect("open");

        std::thread::sleep(Duration::from_millis(30));
        assert!(breaker.allow_request());
        breaker.record_failure("still broken");

        assert_eq!(breaker.state(), CircuitState::Open);
        let second = breaker.cooldown_remaining().expect("reopened");
        assert!(second > first, "cooldown should grow: {second:?} vs {first:?}");
    }

    #[test]
    fn cooldown_growth_is_capped() {
        let breaker = CircuitBreaker::new(test_key(), fast_config());
        assert_eq!(breaker.cooldown_for_trip(1), Duration::from_millis(20));
        assert_eq!(breaker.cooldown_for_trip(2), Duration::from_millis(40));
        assert_eq!(breaker.cooldown_for_trip(3), Duration::from_millis(80));
        assert_eq!(breaker.cooldown_for_trip(4), Duration::from_millis(160));
        assert_eq!(breaker.cooldown_for_trip(10), Duration::from_millis(160));
    }

    #[test]
    fn registry_creates_one_breaker_per_key() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        let us = Region::parse("us").expect("valid");
        let eu = Region::parse("eu").expect("valid");

        registry.record_failure(ProviderId::Plaid, &us, "boom");
        registry.record_failure(ProviderId::Plaid, &us, "boom");

        assert!(registry.is_circuit_open(ProviderId::Plaid, &us));
        assert!(!registry.is_circuit_open(ProviderId::Plaid, &eu));
        assert!(!registry.is_circuit_open(ProviderId::Coinbase, &us));
        assert_eq!(registry.states().len(), 3);
    }
}
