//! Error types for newsroom-core.

use thiserror::Error;

/// Result type alias using newsroom-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for newsroom-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Path discovery error.
    #[error("path error: {0}")]
    Path(String),

    /// Push channel could not be opened.
    #[error("push channel error: {0}")]
    Push(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}
