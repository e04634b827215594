use serde::Deserialize;

use super::{classify_fallback, classify_network, classify_status, ProviderClassifier};
use crate::{ProviderError, ProviderId, RawError};

/// Error envelope returned by the Coinbase exchange API: an `errors`
/// array of `{id, message}` entries, with only the first considered.
#[derive(Debug, Deserialize)]
struct CoinbaseErrorEnvelope {
    #[serde(default)]
    errors: Vec<CoinbaseErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct CoinbaseErrorEntry {
    id: String,
    #[serde(default)]
    message: Option<String>,
}

/// Classifier for Coinbase, the crypto exchange provider.
#[derive(Debug, Default)]
pub struct CoinbaseClassifier;

impl ProviderClassifier for CoinbaseClassifier {
    fn provider(&self) -> ProviderId {
        ProviderId::Coinbase
    }

    fn classify(&self, raw: &RawError, operation: &str) -> ProviderError {
        if let Some(error) = classify_network(ProviderId::Coinbase, raw, operation) {
            return error;
        }

        let entry = raw
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<CoinbaseErrorEnvelope>(body).ok())
            .and_then(|envelope| envelope.errors.into_iter().next());

        if let Some(entry) = entry {
            let message = entry.message.unwrap_or_else(|| raw.message.clone());

            match entry.id.as_str() {
                "authentication_error" | "invalid_token" | "revoked_token" | "expired_token" => {
                    return ProviderError::auth_failed(ProviderId::Coinbase, operation, message);
                }
                "rate_limit_exceeded" => {
                    let error =
                        ProviderError::rate_limited(ProviderId::Coinbase, operation, message);
                    return match raw.retry_after {
                        Some(retry_after) => error.with_retry_after(retry_after),
                        None => error,
                    };
                }
                "internal_server_error" | "service_unavailable" | "under_maintenance" => {
                    return ProviderError::unavailable(ProviderId::Coinbase, operation, message);
                }
                "validation_error" | "invalid_request" | "not_found" => {
                    return ProviderError::sync_failed(
                        ProviderId::Coinbase,
                        operation,
                        message,
                        false,
                    );
                }
                _ => {}
            }
        }

        if let Some(error) = classify_status(ProviderId::Coinbase, raw, operation) {
            return error;
        }

        classify_fallback(ProviderId::Coinbase, raw, operation)
    }
}
