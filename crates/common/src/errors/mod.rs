//! Error types for citenet
//!
//! Provides a single error enum shared by the engine and the gateway:
//! - Domain failures (bad identifiers, missing records, dead-end seeds)
//! - Provider failures, batch-level and per-record
//! - HTTP status code mapping and structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    ValidationError,
    InvalidIdentifier,

    // Resource errors (4xxx)
    NotFound,
    NoReferenceData,
    SessionNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Storage errors (7xxx)
    PersistenceError,

    // Upstream provider errors (8xxx)
    ProviderRequestFailed,
    MalformedUpstreamRecord,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidIdentifier => 1002,

            ErrorCode::NotFound => 4001,
            ErrorCode::NoReferenceData => 4002,
            ErrorCode::SessionNotFound => 4003,

            ErrorCode::RateLimited => 6001,

            ErrorCode::PersistenceError => 7001,

            ErrorCode::ProviderRequestFailed => 8001,
            ErrorCode::MalformedUpstreamRecord => 8002,
            ErrorCode::UpstreamError => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid identifier: '{input}'")]
    InvalidIdentifier { input: String },

    #[error("Article not found: {id}")]
    NotFound { id: String },

    #[error("Article {id} has no reference data; cannot build a citation network from it")]
    NoReferenceData { id: String },

    #[error("Session not found at index {index}")]
    SessionNotFound { index: usize },

    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("{provider} request failed: {message}")]
    ProviderRequestFailed { provider: String, message: String },

    #[error("Malformed {provider} record: {message}")]
    MalformedUpstreamRecord { provider: String, message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a batch-level provider failure
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::ProviderRequestFailed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a per-record parse failure
    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::MalformedUpstreamRecord {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidIdentifier { .. } => ErrorCode::InvalidIdentifier,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::NoReferenceData { .. } => ErrorCode::NoReferenceData,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::ProviderRequestFailed { .. } => ErrorCode::ProviderRequestFailed,
            AppError::MalformedUpstreamRecord { .. } => ErrorCode::MalformedUpstreamRecord,
            AppError::Persistence { .. } => ErrorCode::PersistenceError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::InvalidIdentifier { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } |
            AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,

            // 422 Unprocessable: the record exists but is a dead end
            AppError::NoReferenceData { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 502 Bad Gateway
            AppError::ProviderRequestFailed { .. } |
            AppError::MalformedUpstreamRecord { .. } |
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            AppError::Persistence { .. } |
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) |
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a connector should retry the request that produced this error
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::HttpClient(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
            }
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Persistence {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::NotFound { id: "10.1000/XYZ".into() };
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code().as_code(), 4001);
    }

    #[test]
    fn test_provider_failure_message_names_provider() {
        let err = AppError::provider("OpenAlex", "HTTP 429 for query 'doi:10.1/A'");
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            err.to_string(),
            "OpenAlex request failed: HTTP 429 for query 'doi:10.1/A'"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_invalid_identifier_is_client_error() {
        let err = AppError::InvalidIdentifier { input: "not an id".into() };
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert!(err.to_string().contains("not an id"));
    }

    #[test]
    fn test_dead_end_seed() {
        let err = AppError::NoReferenceData { id: "W1".into() };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), ErrorCode::NoReferenceData);
    }
}
