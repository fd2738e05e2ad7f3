//! Error types for the client, identity store and local server.

use thiserror::Error;

/// Errors raised while talking to the PolicyPal backend.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the backend.
        message: String,
    },
}

/// Errors raised by the local identity store.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Email already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Sign-up form failed validation.
    #[error("Invalid sign-up: {0}")]
    Invalid(String),

    #[error("Identity store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity store is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while starting the local server.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Backend client error: {0}")]
    Client(#[from] ClientError),

    #[error("Identity store error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for backend client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
