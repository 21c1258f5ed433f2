//! Client error types

use crate::types::ErrorResponse;
use std::sync::Arc;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The per-request deadline elapsed before the server answered
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflicting resource, e.g. an email that is already registered
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Access token renewal was exhausted. Every request that waited on the
    /// same renewal receives the same underlying error.
    #[error("Session renewal failed: {0}")]
    RenewalFailed(Arc<ClientError>),

    /// The renewal a request was waiting on went away without settling
    #[error("Session renewal was interrupted")]
    RenewalInterrupted,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Input rejected before it was sent
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Request(error)
        }
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(error: config::ConfigError) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Create error from a status and a raw response body.
    ///
    /// The backend answers errors with `{"message": ..., "error": ...}`; the
    /// `message` field is kept verbatim. Bodies that are not in that shape are
    /// used as-is, and an empty body falls back to the status text.
    pub fn from_body(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|error| error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        let message = if message.is_empty() {
            status.to_string()
        } else {
            message
        };
        Self::from_status(status, message)
    }

    /// Whether this is a 401 from the server
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// Whether the transport deadline elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Human readable message supplied by the server, if there was one
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::AuthenticationFailed(message)
            | Self::NotFound(message)
            | Self::BadRequest(message)
            | Self::Forbidden(message)
            | Self::Conflict(message)
            | Self::ServerError { message, .. } => Some(message),
            Self::RenewalFailed(inner) => inner.server_message(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_body_prefers_message_field() {
        let error = ClientError::from_body(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid email or password","error":"unauthorized"}"#,
        );
        assert!(error.is_unauthorized());
        assert_eq!(error.server_message(), Some("Invalid email or password"));

        let error = ClientError::from_body(StatusCode::BAD_GATEWAY, "");
        assert_eq!(error.server_message(), Some("502 Bad Gateway"));
    }

    #[test]
    fn test_renewal_failure_keeps_server_message() {
        let inner = ClientError::from_body(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid or expired refresh token"}"#,
        );
        let error = ClientError::RenewalFailed(Arc::new(inner));
        assert_eq!(error.server_message(), Some("Invalid or expired refresh token"));
        assert!(!error.is_unauthorized());

        assert_eq!(ClientError::RenewalInterrupted.server_message(), None);
    }
}
