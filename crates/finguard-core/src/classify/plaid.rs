use serde::Deserialize;

use super::{classify_fallback, classify_network, classify_status, ProviderClassifier};
use crate::{ProviderError, ProviderId, RawError};

/// Error envelope returned by the Plaid bank aggregation API.
#[derive(Debug, Deserialize)]
struct PlaidErrorEnvelope {
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Classifier for Plaid, the bank aggregation provider.
///
/// Plaid reports institution health per error code, so outages at a
/// single bank classify as `Unavailable` rather than a hard failure.
#[derive(Debug, Default)]
pub struct PlaidClassifier;

impl ProviderClassifier for PlaidClassifier {
    fn provider(&self) -> ProviderId {
        ProviderId::Plaid
    }

    fn classify(&self, raw: &RawError, operation: &str) -> ProviderError {
        if let Some(error) = classify_network(ProviderId::Plaid, raw, operation) {
            return error;
        }

        let envelope = raw
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<PlaidErrorEnvelope>(body).ok());

        if let Some(envelope) = envelope {
            let code = envelope.error_code.as_deref().unwrap_or_default();
            let message = envelope
                .error_message
                .clone()
                .unwrap_or_else(|| raw.message.clone());

            match code {
                // Credentials gone: the user must re-link the item.
                "ITEM_LOGIN_REQUIRED" | "INVALID_ACCESS_TOKEN" | "INVALID_API_KEYS"
                | "ITEM_LOCKED" | "USER_SETUP_REQUIRED" => {
                    return ProviderError::auth_failed(ProviderId::Plaid, operation, message);
                }
                "RATE_LIMIT_EXCEEDED" | "ITEM_GET_LIMIT" | "ADDITION_LIMIT" => {
                    let error =
                        ProviderError::rate_limited(ProviderId::Plaid, operation, message);
                    return match raw.retry_after {
                        Some(retry_after) => error.with_retry_after(retry_after),
                        None => error,
                    };
                }
                "INSTITUTION_DOWN" | "INSTITUTION_NOT_RESPONDING"
                | "INSTITUTION_NOT_AVAILABLE" | "PLANNED_MAINTENANCE"
                | "INTERNAL_SERVER_ERROR" => {
                    return ProviderError::unavailable(ProviderId::Plaid, operation, message);
                }
                _ => {}
            }

            if envelope.error_type.as_deref() == Some("INSTITUTION_ERROR") {
                return ProviderError::unavailable(ProviderId::Plaid, operation, message);
            }
        }

        if let Some(error) = classify_status(ProviderId::Plaid, raw, operation) {
            return error;
        }

        classify_fallback(ProviderId::Plaid, raw, operation)
    }
}
