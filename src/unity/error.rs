//! Errors raised by the Unity REST client.

use reqwest::StatusCode;
use thiserror::Error;

use super::payload::ErrorBody;

/// Errors raised while talking to the Unisphere REST API.
#[derive(Debug, Error)]
pub enum UnityApiError {
    /// Raised when the configured endpoint is not a usable base URL.
    #[error("invalid array endpoint {endpoint}: {message}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        endpoint: String,
        /// Human-readable parse failure.
        message: String,
    },
    /// Raised when the request cannot be sent or the response cannot be read.
    #[error("array request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Raised when the array answers with a non-success status.
    #[error("array returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Unity error code when the body carried one.
        code: Option<u64>,
        /// Message reported by the array.
        message: String,
    },
    /// Raised when a successful response does not have the expected shape.
    #[error("unexpected array response: {0}")]
    Decode(String),
}

impl UnityApiError {
    /// Builds an [`UnityApiError::Api`] from a failed response, preferring the
    /// array's structured error message over the raw body.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<ErrorBody>(body).ok();
        let code = parsed.as_ref().and_then(|err| err.error.error_code);
        let message = parsed
            .and_then(|err| err.error.message())
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(body).trim().to_owned();
                if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("no message")
                        .to_owned()
                } else {
                    text
                }
            });
        Self::Api {
            status: status.as_u16(),
            code,
            message,
        }
    }
}
