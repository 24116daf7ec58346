//! Pending message tracking per chat
//!
//! Every tracked chat owns a queue of messages waiting for deletion. The
//! sweeper drains expired entries out of a queue while new arrivals may be
//! appended to it from webhook handlers; both go through the chat's shard
//! lock, so a concurrent arrival lands either in the kept set or in the
//! next drain, never in both.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;

use crate::retention::types::{ChatId, MessageId, UserId};

/// A message waiting for its retention window to elapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingMessage {
    pub message_id: MessageId,
    pub arrived_at: DateTime<Utc>,
    pub author_id: UserId,
}

impl PendingMessage {
    /// A message is expired once `now - arrived_at >= retention`.
    ///
    /// Arrivals stamped in the future (clock skew) are never expired.
    pub fn is_expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        let Ok(retention) = TimeDelta::from_std(retention) else {
            return false;
        };
        now.signed_duration_since(self.arrived_at) >= retention
    }
}

/// Result of partitioning a chat queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drained {
    /// Records still inside their retention window, now the stored queue
    pub kept: Vec<PendingMessage>,
    /// Records removed from the queue and due for deletion
    pub expired: Vec<PendingMessage>,
}

/// Pending messages for every tracked chat
#[derive(Debug, Default)]
pub struct ArrivalTracker {
    queues: DashMap<ChatId, Vec<PendingMessage>>,
}

impl ArrivalTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to its chat's queue.
    ///
    /// Duplicate deliveries produce duplicate records.
    pub fn record_arrival(
        &self,
        chat: ChatId,
        message_id: MessageId,
        author_id: UserId,
        arrived_at: DateTime<Utc>,
    ) {
        self.queues.entry(chat).or_default().push(PendingMessage {
            message_id,
            arrived_at,
            author_id,
        });
    }

    /// Number of pending messages for a chat
    pub fn count(&self, chat: ChatId) -> usize {
        self.queues.get(&chat).map(|q| q.len()).unwrap_or(0)
    }

    /// Snapshot of the chats currently known to the tracker
    pub fn conversations(&self) -> Vec<ChatId> {
        self.queues.iter().map(|entry| *entry.key()).collect()
    }

    /// Pending messages across all chats
    pub fn total_pending(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().len()).sum()
    }

    /// Split a chat's queue by expiry and keep only the unexpired part.
    ///
    /// The queue need not be sorted; every record is checked.
    pub fn drain_expired(&self, chat: ChatId, retention: Duration, now: DateTime<Utc>) -> Drained {
        let Some(mut queue) = self.queues.get_mut(&chat) else {
            return Drained::default();
        };

        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(queue.value_mut())
            .into_iter()
            .partition(|message| message.is_expired(retention, now));

        *queue.value_mut() = kept.clone();
        Drained { kept, expired }
    }

    /// Remove a chat entry if its queue is empty at the time of the call
    pub fn prune_if_empty(&self, chat: ChatId) -> bool {
        self.queues
            .remove_if(&chat, |_, queue| queue.is_empty())
            .is_some()
    }
}
