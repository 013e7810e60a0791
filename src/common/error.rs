//! Error types for the application.

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Protocol-related errors (chat platform connection).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid access token header: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

/// Persistence errors from the binding record store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to write binding file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode binding records: {0}")]
    Serialize(#[from] serde_json::Error),
}
