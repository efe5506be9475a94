//! Error types for the Wings API client.

use thiserror::Error;

/// Errors surfaced by [`crate::WingsClient`] operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a status of 400 or above.
    #[error("unexpected status code: {status}, {body}")]
    RemoteRequest { status: u16, body: String },

    /// The request never produced a response, even after retrying.
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode value response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// Create a remote request error from a status code and raw body.
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::RemoteRequest {
            status,
            body: body.into(),
        }
    }

    /// HTTP status carried by the error, if the server responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRequest { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Errors produced while resolving a [`crate::ClientConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing or empty configuration: {}", .settings.join(", "))]
    Missing { settings: Vec<String> },

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_reports_status_and_body() {
        let error = ApiError::remote(409, "{\"message\":\"conflict\"}");
        assert_eq!(error.status(), Some(409));
        assert!(!error.is_not_found());
        assert_eq!(error.to_string(), "unexpected status code: 409, {\"message\":\"conflict\"}");
    }

    #[test]
    fn not_found_is_detected() {
        assert!(ApiError::remote(404, "").is_not_found());
        assert!(!ApiError::Cancelled.is_not_found());
        assert_eq!(ApiError::DeadlineExceeded.status(), None);
    }

    #[test]
    fn missing_config_lists_every_setting() {
        let error = ConfigError::Missing {
            settings: vec!["endpoint (WINGS_ENDPOINT)".into(), "api_key (WINGS_API_KEY)".into()],
        };
        assert_eq!(
            error.to_string(),
            "missing or empty configuration: endpoint (WINGS_ENDPOINT), api_key (WINGS_API_KEY)"
        );
    }
}
