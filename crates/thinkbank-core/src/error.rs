//! Error types for thinkbank.

use thiserror::Error;

/// Result type alias using thinkbank's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for thinkbank operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Asset not found
    #[error("Asset not found: {0}")]
    AssetNotFound(i64),

    /// Remote fetch, store, or inference call failed in transit
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inference service answered with a non-success or malformed response
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Unrecognized or corrupt media container
    #[error("Decode error: {0}")]
    Decode(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Queue/broker error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}
