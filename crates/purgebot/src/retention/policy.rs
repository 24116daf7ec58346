//! Per-chat retention policies
//!
//! Chats without an explicit policy use the configured default. Policies can
//! be overwritten but never removed.

use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;

use crate::config::RetentionConfig;
use crate::retention::types::ChatId;

/// Validation errors for retention updates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Retention of {requested}s is below the minimum of {minimum}s")]
    BelowMinimum { requested: u64, minimum: u64 },

    #[error("Retention of {requested}s exceeds the maximum of {maximum}s")]
    AboveMaximum { requested: u64, maximum: u64 },
}

/// Retention duration per chat
#[derive(Debug)]
pub struct PolicyStore {
    policies: DashMap<ChatId, Duration>,
    default: Duration,
    minimum: Duration,
    maximum: Option<Duration>,
}

impl PolicyStore {
    pub fn new(config: &RetentionConfig) -> Self {
        Self {
            policies: DashMap::new(),
            default: Duration::from_secs(config.default_secs),
            minimum: Duration::from_secs(config.min_secs),
            maximum: (config.max_secs > 0).then(|| Duration::from_secs(config.max_secs)),
        }
    }

    /// Retention for a chat, or the default when none was set
    pub fn get(&self, chat: ChatId) -> Duration {
        self.policies
            .get(&chat)
            .map(|entry| *entry.value())
            .unwrap_or(self.default)
    }

    /// Set the retention for a chat, returning the previous explicit value
    ///
    /// Out-of-range values are rejected and leave the current policy as is.
    pub fn set(&self, chat: ChatId, retention: Duration) -> Result<Option<Duration>, PolicyError> {
        if retention < self.minimum {
            return Err(PolicyError::BelowMinimum {
                requested: retention.as_secs(),
                minimum: self.minimum.as_secs(),
            });
        }
        if let Some(maximum) = self.maximum
            && retention > maximum
        {
            return Err(PolicyError::AboveMaximum {
                requested: retention.as_secs(),
                maximum: maximum.as_secs(),
            });
        }

        let previous = self.policies.insert(chat, retention);
        tracing::info!(
            chat_id = %chat,
            retention_secs = retention.as_secs(),
            "Retention policy updated"
        );
        Ok(previous)
    }

    /// Whether the chat has an explicit policy
    pub fn is_custom(&self, chat: ChatId) -> bool {
        self.policies.contains_key(&chat)
    }

    /// Number of chats with an explicit policy
    pub fn overrides(&self) -> usize {
        self.policies.len()
    }

    pub fn default_retention(&self) -> Duration {
        self.default
    }

    pub fn minimum(&self) -> Duration {
        self.minimum
    }

    pub fn maximum(&self) -> Option<Duration> {
        self.maximum
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(&RetentionConfig::default())
    }
}
