use serde::Deserialize;

use super::{classify_fallback, classify_network, classify_status, ProviderClassifier};
use crate::{ProviderError, ProviderId, RawError};

/// Error envelope returned by the Stripe payments API.
#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    #[serde(default)]
    error: Option<StripeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classifier for Stripe, the payment processor.
///
/// Deliberately conservative: card and request errors are terminal so a
/// charge is never resubmitted on ambiguous failures.
#[derive(Debug, Default)]
pub struct StripeClassifier;

impl ProviderClassifier for StripeClassifier {
    fn provider(&self) -> ProviderId {
        ProviderId::Stripe
    }

    fn classify(&self, raw: &RawError, operation: &str) -> ProviderError {
        if let Some(error) = classify_network(ProviderId::Stripe, raw, operation) {
            return error;
        }

        let body = raw
            .body
            .as_deref()
            .and_then(|body| serde_json::from_str::<StripeErrorEnvelope>(body).ok())
            .and_then(|envelope| envelope.error);

        if let Some(body) = body {
            let message = body.message.unwrap_or_else(|| raw.message.clone());

            match body.kind.as_deref().unwrap_or_default() {
                "authentication_error" => {
                    return ProviderError::auth_failed(ProviderId::Stripe, operation, message);
                }
                "rate_limit_error" => {
                    let error =
                        ProviderError::rate_limited(ProviderId::Stripe, operation, message);
                    return match raw.retry_after {
                        Some(retry_after) => error.with_retry_after(retry_after),
                        None => error,
                    };
                }
                "api_error" => {
                    return ProviderError::unavailable(ProviderId::Stripe, operation, message);
                }
                "card_error" | "invalid_request_error" | "idempotency_error" => {
                    return ProviderError::sync_failed(
                        ProviderId::Stripe,
                        operation,
                        message,
                        false,
                    );
                }
                _ => {}
            }
        }

        if let Some(error) = classify_status(ProviderId::Stripe, raw, operation) {
            return error;
        }

        classify_fallback(ProviderId::Stripe, raw, operation)
    }
}
