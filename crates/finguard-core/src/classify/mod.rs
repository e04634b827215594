//! Per-provider error classification.
//!
//! Each provider speaks its own error envelope; a classifier normalizes
//! whatever came back into a [`ProviderError`] carrying a retryability
//! verdict. Classification is pure: no I/O, deterministic, unit-testable
//! per provider.
//!
//! | Classifier | Provider | Envelope shape |
//! |------------|----------|----------------|
//! | [`PlaidClassifier`] | Plaid | `{"error_type", "error_code", "error_message"}` |
//! | [`CoinbaseClassifier`] | Coinbase | `{"errors": [{"id", "message"}]}` |
//! | [`StripeClassifier`] | Stripe | `{"error": {"type", "code", "message"}}` |

pub mod coinbase;
pub mod plaid;
pub mod stripe;

pub use coinbase::CoinbaseClassifier;
pub use plaid::PlaidClassifier;
pub use stripe::StripeClassifier;

use crate::{ProviderError, ProviderId, RawError};

/// Strategy contract: one classifier per provider error envelope, all
/// normalizing to the same [`ProviderError`] shape.
pub trait ProviderClassifier: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Map a raw failure into a structured provider error.
    fn classify(&self, raw: &RawError, operation: &str) -> ProviderError;
}

/// Returns the classifier for `provider`.
pub fn classifier_for(provider: ProviderId) -> &'static dyn ProviderClassifier {
    match provider {
        ProviderId::Plaid => &PlaidClassifier,
        ProviderId::Coinbase => &CoinbaseClassifier,
        ProviderId::Stripe => &StripeClassifier,
    }
}

/// Message fragments observed on transient failures worth another attempt.
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection reset",
    "econnreset",
    "etimedout",
    "econnrefused",
    "socket hang up",
    "broken pipe",
    "temporarily unavailable",
    "service unavailable",
    "connection closed",
    "network",
];

pub(crate) fn is_transient_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TRANSIENT_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Network-level classification shared by every provider; timeouts and
/// connection failures do not depend on the provider envelope.
pub(crate) fn classify_network(
    provider: ProviderId,
    raw: &RawError,
    operation: &str,
) -> Option<ProviderError> {
    let lower = raw.message.to_ascii_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") {
        return Some(ProviderError::timeout(
            provider,
            operation,
            raw.message.clone(),
        ));
    }

    if lower.contains("connection failed")
        || lower.contains("refused")
        || lower.contains("reset")
        || lower.contains("abort")
    {
        return Some(ProviderError::unavailable(
            provider,
            operation,
            raw.message.clone(),
        ));
    }

    None
}

/// HTTP-status fallback shared by every provider, applied after the
/// envelope-specific rules found no match.
pub(crate) fn classify_status(
    provider: ProviderId,
    raw: &RawError,
    operation: &str,
) -> Option<ProviderError> {
    let status = raw.status?;
    let error = match status {
        401 | 403 => ProviderError::auth_failed(provider, operation, raw.message.clone()),
        408 => ProviderError::timeout(provider, operation, raw.message.clone()),
        429 => {
            let error = ProviderError::rate_limited(provider, operation, raw.message.clone());
            match raw.retry_after {
                Some(retry_after) => error.with_retry_after(retry_after),
                None => error,
            }
        }
        status if status >= 500 => {
            ProviderError::unavailable(provider, operation, raw.message.clone())
        }
        _ => return None,
    };
    Some(error)
}

/// Last-resort classification for failures no rule matched.
pub(crate) fn classify_fallback(
    provider: ProviderId,
    raw: &RawError,
    operation: &str,
) -> ProviderError {
    ProviderError::sync_failed(
        provider,
        operation,
        raw.message.clone(),
        is_transient_message(&raw.message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn transient_patterns_match_case_insensitively() {
        assert!(is_transient_message("ECONNRESET while reading response"));
        assert!(is_transient_message("upstream Temporarily Unavailable"));
        assert!(!is_transient_message("invalid account id"));
    }

    #[test]
    fn network_timeout_maps_to_timeout_kind() {
        let raw = RawError::new("request timeout: deadline exceeded");
        let error = classify_network(ProviderId::Plaid, &raw, "sync").expect("network failure");
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(error.retryable());
    }

    #[test]
    fn connection_refused_maps_to_unavailable() {
        let raw = RawError::new("connection failed: connection refused");
        let error = classify_network(ProviderId::Coinbase, &raw, "balances").expect("refused");
        assert_eq!(error.kind(), ErrorKind::Unavailable);
        assert!(error.retryable());
    }

    #[test]
    fn status_fallback_covers_the_common_codes() {
        let auth = classify_status(
            ProviderId::Plaid,
            &RawError::from_status(401, "{}"),
            "sync",
        )
        .expect("classified");
        assert_eq!(auth.kind(), ErrorKind::AuthFailed);

        let limited = classify_status(
            ProviderId::Plaid,
            &RawError::from_status(429, "{}"),
            "sync",
        )
        .expect("classified");
        assert_eq!(limited.kind(), ErrorKind::RateLimited);

        let outage = classify_status(
            ProviderId::Plaid,
            &RawError::from_status(503, "{}"),
            "sync",
        )
        .expect("classified");
        assert_eq!(outage.kind(), ErrorKind::Unavailable);

        assert!(classify_status(
            ProviderId::Plaid,
            &RawError::from_status(404, "{}"),
            "sync"
        )
        .is_none());
    }

    #[test]
    fn unmatched_failures_fall_back_to_sync_failed() {
        let transient = classify_fallback(
            ProviderId::Stripe,
            &RawError::new("socket hang up mid-response"),
            "charge",
        );
        assert_eq!(transient.kind(), ErrorKind::SyncFailed);
        assert!(transient.retryable());

        let terminal = classify_fallback(
            ProviderId::Stripe,
            &RawError::new("ledger entry malformed"),
            "charge",
        );
        assert_eq!(terminal.kind(), ErrorKind::SyncFailed);
        assert!(!terminal.retryable());
    }
}
