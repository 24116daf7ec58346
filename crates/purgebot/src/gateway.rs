//! Deletion gateway abstraction
//!
//! The sweeper never talks to Telegram directly; it hands expired messages
//! to a [`DeletionGateway`]. The production implementation is
//! [`crate::telegram::TelegramClient`], tests use
//! [`crate::testing::RecordingGateway`].

use async_trait::async_trait;
use thiserror::Error;

use crate::retention::{ChatId, MessageId};

/// Why a platform call failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The message is already gone or too old to delete
    #[error("Message not found: {0}")]
    NotFound(String),

    /// The bot lacks the rights to perform the call
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The platform asked us to slow down
    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// The call did not complete within its deadline
    #[error("Request timed out")]
    Timeout,

    /// Any other error reported by the platform
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Connection, TLS or decoding failure
    #[error("Transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Outcomes expected during normal operation (message already removed,
    /// missing admin rights) rather than signs of a malfunction.
    pub fn is_benign(&self) -> bool {
        matches!(self, GatewayError::NotFound(_) | GatewayError::Forbidden(_))
    }
}

/// Capability to remove a message from a chat
#[async_trait]
pub trait DeletionGateway: Send + Sync {
    /// Delete one message. Deleting a message twice is harmless; the second
    /// call fails with [`GatewayError::NotFound`].
    async fn delete(&self, chat: ChatId, message: MessageId) -> Result<(), GatewayError>;

    /// Gateway name for logging
    fn name(&self) -> &'static str;
}
