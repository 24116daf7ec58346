//! Admin module for the local operator API
//!
//! Shared request/response types between the daemon's `/admin` routes and
//! `purgebot-cli`.

pub mod handlers;

use serde::{Deserialize, Serialize};

use crate::commands::StatusReport;
use crate::sweeper::SweepStatsSnapshot;

/// Daemon-wide statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AdminStats {
    /// Chats with an entry in the arrival tracker
    pub tracked_chats: u64,
    /// Messages waiting for deletion across all chats
    pub pending_messages: u64,
    /// Chats with an explicit retention policy
    pub custom_policies: u64,
    /// Retention used when a chat has no policy
    pub default_retention_secs: u64,
    /// Smallest retention accepted
    pub min_retention_secs: u64,
    /// Largest retention accepted, if bounded
    pub max_retention_secs: Option<u64>,
    /// Cumulative sweeper counters
    pub sweeper: SweepStatsSnapshot,
    /// Bot account id, when known
    pub bot_user_id: Option<i64>,
    /// Seconds since the daemon started
    pub uptime_secs: u64,
}

/// Retention status of one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatStatus {
    pub chat_id: i64,
    pub retention_secs: u64,
    /// False when the chat uses the default retention
    pub custom: bool,
    pub pending: u64,
}

impl From<&StatusReport> for ChatStatus {
    fn from(report: &StatusReport) -> Self {
        Self {
            chat_id: report.chat.0,
            retention_secs: report.retention.as_secs(),
            custom: report.custom,
            pending: report.pending as u64,
        }
    }
}

/// Body of `PUT /admin/chats/{chat_id}/retention`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionUpdate {
    pub seconds: u64,
}
