//! Test utilities for purgebot - in-memory stand-ins for Telegram
//!
//! - [`RecordingGateway`] records deletions and replies, and can be told to
//!   fail for specific messages or stall on every call
//! - [`StaticAdminDirectory`] answers admin lookups from a fixed set

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::commands::{AdminDirectory, Reply, ReplySender};
use crate::gateway::{DeletionGateway, GatewayError};
use crate::retention::{ChatId, MessageId, UserId};

/// Gateway that records every call instead of talking to Telegram
#[derive(Debug, Default)]
pub struct RecordingGateway {
    deletions: Mutex<Vec<(ChatId, MessageId)>>,
    replies: Mutex<Vec<(ChatId, Reply)>>,
    failures: Mutex<HashMap<MessageId, GatewayError>>,
    delay: Option<Duration>,
    reply_delay: Option<Duration>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every deletion call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep this long before recording each reply
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = Some(delay);
        self
    }

    /// Make deletions of `message` fail with `error`
    pub fn fail_with(&self, message: MessageId, error: GatewayError) {
        self.failures.lock().unwrap().insert(message, error);
    }

    /// Every deletion attempt, in call order
    pub fn deletions(&self) -> Vec<(ChatId, MessageId)> {
        self.deletions.lock().unwrap().clone()
    }

    /// Every reply sent, in call order
    pub fn replies(&self) -> Vec<(ChatId, Reply)> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeletionGateway for RecordingGateway {
    async fn delete(&self, chat: ChatId, message: MessageId) -> Result<(), GatewayError> {
        self.deletions.lock().unwrap().push((chat, message));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().unwrap().get(&message) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[async_trait]
impl ReplySender for RecordingGateway {
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> Result<(), GatewayError> {
        if let Some(delay) = self.reply_delay {
            tokio::time::sleep(delay).await;
        }
        self.replies.lock().unwrap().push((chat, reply.clone()));
        Ok(())
    }
}

/// Admin lookups answered from a fixed set of (chat, user) pairs
#[derive(Debug, Default)]
pub struct StaticAdminDirectory {
    admins: HashSet<(ChatId, UserId)>,
    fail: bool,
}

impl StaticAdminDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory whose lookups always fail
    pub fn failing() -> Self {
        Self {
            admins: HashSet::new(),
            fail: true,
        }
    }

    pub fn with_admin(mut self, chat: ChatId, user: UserId) -> Self {
        self.admins.insert((chat, user));
        self
    }
}

#[async_trait]
impl AdminDirectory for StaticAdminDirectory {
    async fn is_admin(&self, chat: ChatId, user: UserId) -> Result<bool, GatewayError> {
        if self.fail {
            return Err(GatewayError::Transport("admin lookup unavailable".into()));
        }
        Ok(self.admins.contains(&(chat, user)))
    }
}
