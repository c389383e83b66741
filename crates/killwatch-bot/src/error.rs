//! Error types for the bot's network clients.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the RedisQ, ESI and Matrix clients.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level HTTP error (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Feed payload could not be decoded.
    #[error(transparent)]
    Core(#[from] killwatch_core::Error),

    /// The Matrix homeserver rejected a request.
    #[error("Matrix error: {0}")]
    Matrix(String),
}
