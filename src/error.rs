//! Error types for LAIM
//!
//! This module defines the error taxonomy shared by the backend client,
//! stream relay, conversation store and dispatcher, using `thiserror` for
//! ergonomic error handling. Errors travel as `anyhow::Error`; the HTTP layer
//! recovers the taxonomy with `downcast_ref::<LaimError>()`.

use thiserror::Error;

/// Main error type for LAIM operations
#[derive(Error, Debug)]
pub enum LaimError {
    /// Malformed or missing fields in a client request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A session tried to reach a chat it does not own
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unknown chat, session, file or model
    #[error("Not found: {0}")]
    NotFound(String),

    /// The inference server could not be reached (refused, reset, timed out)
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The inference server answered with an error, either as a non-success
    /// status or as an in-band error record after streaming began
    #[error("Backend rejected request: status={status}, {body}")]
    BackendRejected {
        /// HTTP status reported by the backend (200 for in-band errors)
        status: u16,
        /// Error body or in-band error message
        body: String,
    },

    /// The inference server sent a body that could not be decoded
    #[error("Backend protocol error: {0}")]
    BackendProtocol(String),

    /// The backend stream ended without a completion record
    #[error("Stream truncated: {0}")]
    Truncated(String),

    /// Conversation storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors not classified by the backend client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LaimError {
    /// Short machine-readable name of the error kind
    ///
    /// Used as the `error` field of JSON error bodies and as the `kind` of
    /// in-stream error markers.
    ///
    /// # Examples
    ///
    /// ```
    /// use laim::error::LaimError;
    ///
    /// let err = LaimError::Forbidden("chat belongs to another session".into());
    /// assert_eq!(err.kind(), "forbidden");
    /// ```
    pub fn kind(&self) -> &'static str {
        match self {
            LaimError::InvalidRequest(_) => "invalid_request",
            LaimError::Forbidden(_) => "forbidden",
            LaimError::NotFound(_) => "not_found",
            LaimError::BackendUnavailable(_) => "backend_unavailable",
            LaimError::BackendRejected { .. } => "backend_rejected",
            LaimError::BackendProtocol(_) => "backend_protocol",
            LaimError::Truncated(_) => "truncated",
            LaimError::Storage(_) => "storage",
            LaimError::Config(_) => "config",
            LaimError::Io(_) => "io",
            LaimError::Serialization(_) => "serialization",
            LaimError::Yaml(_) => "yaml",
            LaimError::Http(_) => "http",
        }
    }
}

/// Find the `LaimError` carried by an `anyhow::Error`, if any
pub fn classify(err: &anyhow::Error) -> Option<&LaimError> {
    err.downcast_ref::<LaimError>()
}

/// Result type alias for LAIM operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
