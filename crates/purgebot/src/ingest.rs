//! Inbound message ingestion
//!
//! Converts Bot API messages into [`InboundMessage`] events and records the
//! ones that should eventually be deleted. Malformed messages are rejected
//! here so no record is ever created for them.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::retention::{ArrivalTracker, ChatId, ChatKind, MessageId, UserId};
use crate::telegram::types::Message;

/// Why an inbound message could not be turned into an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Unknown chat type: {0}")]
    UnknownChatKind(String),

    #[error("Message {0} has no author")]
    MissingAuthor(i64),

    #[error("Message {message_id} has an invalid timestamp: {date}")]
    InvalidTimestamp { message_id: i64, date: i64 },
}

/// The bot's own account, used to skip its messages and match `/cmd@name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
    pub username: Option<String>,
}

/// A "message created" event from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub author_id: UserId,
    pub is_bot_author: bool,
    pub chat_kind: ChatKind,
    pub timestamp: DateTime<Utc>,
    pub text: Option<String>,
}

impl TryFrom<&Message> for InboundMessage {
    type Error = IngestError;

    fn try_from(message: &Message) -> Result<Self, Self::Error> {
        let chat_kind = ChatKind::parse(&message.chat.kind)
            .ok_or_else(|| IngestError::UnknownChatKind(message.chat.kind.clone()))?;
        let author = message
            .from
            .as_ref()
            .ok_or(IngestError::MissingAuthor(message.message_id))?;
        let timestamp = DateTime::from_timestamp(message.date, 0)
            .filter(|_| message.date > 0)
            .ok_or(IngestError::InvalidTimestamp {
                message_id: message.message_id,
                date: message.date,
            })?;

        Ok(Self {
            chat_id: ChatId(message.chat.id),
            message_id: MessageId(message.message_id),
            author_id: UserId(author.id),
            is_bot_author: author.is_bot,
            chat_kind,
            timestamp,
            text: message.text.clone(),
        })
    }
}

/// What happened to an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    Tracked,
    /// Not a group chat
    UntrackedChat(ChatKind),
    /// Posted by this bot
    SelfAuthored,
}

/// Feeds inbound messages into the arrival tracker
#[derive(Debug, Clone)]
pub struct Ingestor {
    tracker: Arc<ArrivalTracker>,
    identity: Option<BotIdentity>,
}

impl Ingestor {
    pub fn new(tracker: Arc<ArrivalTracker>, identity: Option<BotIdentity>) -> Self {
        Self { tracker, identity }
    }

    pub fn identity(&self) -> Option<&BotIdentity> {
        self.identity.as_ref()
    }

    /// Track a message for deletion unless it is excluded
    pub fn accept(&self, event: &InboundMessage) -> Ingested {
        if !event.chat_kind.is_tracked() {
            return Ingested::UntrackedChat(event.chat_kind);
        }
        if self
            .identity
            .as_ref()
            .is_some_and(|bot| bot.id == event.author_id)
        {
            return Ingested::SelfAuthored;
        }

        self.tracker.record_arrival(
            event.chat_id,
            event.message_id,
            event.author_id,
            event.timestamp,
        );
        tracing::trace!(
            chat_id = %event.chat_id,
            message_id = %event.message_id,
            "Tracking message"
        );
        Ingested::Tracked
    }
}
