//! Error types for purgebot

use thiserror::Error;

/// Main error type for purgebot operations
#[derive(Error, Debug)]
pub enum PurgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Telegram Bot API client errors (construction, identity lookup)
    #[error("Telegram error: {0}")]
    Telegram(String),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<crate::gateway::GatewayError> for PurgeError {
    fn from(e: crate::gateway::GatewayError) -> Self {
        PurgeError::Telegram(e.to_string())
    }
}

/// Result type alias for purgebot operations
pub type Result<T> = std::result::Result<T, PurgeError>;
