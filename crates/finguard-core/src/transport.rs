//! Normalized raw failures handed to the error classifier.
//!
//! The layer never owns HTTP calls; integrations run their own requests
//! and hand back whatever failed — an HTTP status with the provider's
//! error envelope, or a transport-level message.

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Raw provider failure before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    /// HTTP status, when the provider answered at all.
    pub status: Option<u16>,
    /// Raw response body, usually the provider's error envelope JSON.
    pub body: Option<String>,
    /// Transport-level message.
    pub message: String,
    /// Wait hint from a `Retry-After` header.
    pub retry_after: Option<Duration>,
}

impl RawError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Failure built from a non-2xx response.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: Some(body.into()),
            message: format!("provider returned status {status}"),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl Display for RawError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for RawError {}

impl From<reqwest::Error> for RawError {
    fn from(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            format!("request timeout: {error}")
        } else if error.is_connect() {
            format!("connection failed: {error}")
        } else {
            format!("request failed: {error}")
        };

        Self {
            status: error.status().map(|status| status.as_u16()),
            body: None,
            message,
            retry_after: None,
        }
    }
}
