//! Periodic expiry sweeper
//!
//! Each tick walks every tracked chat, drains the messages whose retention
//! window has elapsed and asks the [`DeletionGateway`] to remove them.
//!
//! Deletion is attempted at most once per record: a failed call is logged
//! and the record is gone from the tracker either way. Gateway calls run
//! after the tracker's locks are released and each one is bounded by a
//! timeout, so a hanging request can delay a tick but never block arrivals.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SweeperConfig;
use crate::gateway::{DeletionGateway, GatewayError};
use crate::retention::{ArrivalTracker, ChatId, PendingMessage, PolicyStore};

/// Outcome of a single sweep tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Chats inspected
    pub conversations: usize,
    /// Records drained as expired
    pub expired: usize,
    /// Successful deletion calls
    pub deleted: usize,
    /// Failed deletion calls (including timeouts)
    pub failed: usize,
    /// Empty chats dropped from the tracker
    pub pruned: usize,
}

/// Cumulative sweeper counters, shared with the admin API
#[derive(Debug, Default)]
pub struct SweepStats {
    ticks: AtomicU64,
    expired: AtomicU64,
    deleted: AtomicU64,
    failed: AtomicU64,
    last_sweep_unix: AtomicI64,
}

/// Point-in-time copy of [`SweepStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStatsSnapshot {
    pub ticks: u64,
    pub expired: u64,
    pub deleted: u64,
    pub failed: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
}

impl SweepStats {
    fn record(&self, report: &SweepReport, at: DateTime<Utc>) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.expired
            .fetch_add(report.expired as u64, Ordering::Relaxed);
        self.deleted
            .fetch_add(report.deleted as u64, Ordering::Relaxed);
        self.failed.fetch_add(report.failed as u64, Ordering::Relaxed);
        self.last_sweep_unix.store(at.timestamp(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SweepStatsSnapshot {
        let last = self.last_sweep_unix.load(Ordering::Relaxed);
        SweepStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_sweep_at: (last != 0)
                .then(|| DateTime::from_timestamp(last, 0))
                .flatten(),
        }
    }
}

/// Drains expired messages and deletes them through the gateway
pub struct Sweeper {
    policies: Arc<PolicyStore>,
    tracker: Arc<ArrivalTracker>,
    gateway: Arc<dyn DeletionGateway>,
    config: SweeperConfig,
    stats: Arc<SweepStats>,
}

impl Sweeper {
    pub fn new(
        policies: Arc<PolicyStore>,
        tracker: Arc<ArrivalTracker>,
        gateway: Arc<dyn DeletionGateway>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            policies,
            tracker,
            gateway,
            config,
            stats: Arc::new(SweepStats::default()),
        }
    }

    /// Shared handle to the cumulative counters
    pub fn stats(&self) -> Arc<SweepStats> {
        self.stats.clone()
    }

    /// Run one sweep against the current wall clock
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep as if the current time were `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let mut due: Vec<(ChatId, PendingMessage)> = Vec::new();

        for chat in self.tracker.conversations() {
            report.conversations += 1;
            let retention = self.policies.get(chat);
            let drained = self.tracker.drain_expired(chat, retention, now);

            if drained.kept.is_empty() && self.config.prune_empty && self.tracker.prune_if_empty(chat) {
                report.pruned += 1;
            }

            due.extend(drained.expired.into_iter().map(|message| (chat, message)));
        }

        report.expired = due.len();

        let outcomes: Vec<bool> = stream::iter(due)
            .map(|(chat, message)| self.delete_one(chat, message))
            .buffer_unordered(self.config.max_concurrent_deletes.max(1))
            .collect()
            .await;

        report.deleted = outcomes.iter().filter(|ok| **ok).count();
        report.failed = outcomes.len() - report.deleted;

        self.stats.record(&report, now);

        if report.expired > 0 {
            info!(
                conversations = report.conversations,
                expired = report.expired,
                deleted = report.deleted,
                failed = report.failed,
                pruned = report.pruned,
                "Sweep completed"
            );
        } else {
            debug!(
                conversations = report.conversations,
                pruned = report.pruned,
                "Sweep completed, nothing expired"
            );
        }

        report
    }

    async fn delete_one(&self, chat: ChatId, message: PendingMessage) -> bool {
        let deadline = Duration::from_secs(self.config.delete_timeout_secs);
        let result = match tokio::time::timeout(deadline, self.gateway.delete(chat, message.message_id)).await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };

        match result {
            Ok(()) => {
                debug!(chat_id = %chat, message_id = %message.message_id, "Deleted message");
                true
            }
            Err(e) if e.is_benign() => {
                debug!(
                    chat_id = %chat,
                    message_id = %message.message_id,
                    error = %e,
                    "Message could not be deleted"
                );
                false
            }
            Err(e) => {
                warn!(
                    chat_id = %chat,
                    message_id = %message.message_id,
                    gateway = self.gateway.name(),
                    error = %e,
                    "Failed to delete message"
                );
                false
            }
        }
    }

    /// Sweep on a fixed interval until `shutdown` is cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.interval_secs,
            delete_timeout_secs = self.config.delete_timeout_secs,
            "Sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Spawn [`Sweeper::run`] on the tokio runtime
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::{MessageId, UserId};
    use crate::testing::RecordingGateway;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn sweeper_with(gateway: Arc<RecordingGateway>, config: SweeperConfig) -> Sweeper {
        Sweeper::new(
            Arc::new(PolicyStore::default()),
            Arc::new(ArrivalTracker::new()),
            gateway,
            config,
        )
    }

    #[tokio::test]
    async fn test_empty_sweep() {
        let sweeper = sweeper_with(Arc::new(RecordingGateway::new()), SweeperConfig::default());
        let report = sweeper.sweep_at(at(0)).await;
        assert_eq!(report, SweepReport::default());
        assert_eq!(sweeper.stats().snapshot().ticks, 1);
    }

    #[tokio::test]
    async fn test_prune_disabled_keeps_empty_chats() {
        let gateway = Arc::new(RecordingGateway::new());
        let config = SweeperConfig {
            prune_empty: false,
            ..SweeperConfig::default()
        };
        let sweeper = sweeper_with(gateway.clone(), config);
        sweeper
            .tracker
            .record_arrival(ChatId(1), MessageId(1), UserId(1), at(0));

        let report = sweeper.sweep_at(at(400)).await;
        assert_eq!(report.deleted, 1);
        assert_eq!(report.pruned, 0);
        assert_eq!(sweeper.tracker.conversations(), vec![ChatId(1)]);
    }

    #[tokio::test]
    async fn test_prune_enabled_drops_empty_chats() {
        let gateway = Arc::new(RecordingGateway::new());
        let sweeper = sweeper_with(gateway, SweeperConfig::default());
        sweeper
            .tracker
            .record_arrival(ChatId(1), MessageId(1), UserId(1), at(0));

        let report = sweeper.sweep_at(at(400)).await;
        assert_eq!(report.pruned, 1);
        assert!(sweeper.tracker.conversations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delete_times_out() {
        let gateway = Arc::new(RecordingGateway::new().with_delay(Duration::from_secs(60)));
        let config = SweeperConfig {
            delete_timeout_secs: 1,
            ..SweeperConfig::default()
        };
        let sweeper = sweeper_with(gateway.clone(), config);
        sweeper
            .tracker
            .record_arrival(ChatId(1), MessageId(1), UserId(1), at(0));

        let report = sweeper.sweep_at(at(400)).await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(sweeper.tracker.count(ChatId(1)), 0);
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let gateway = Arc::new(RecordingGateway::new());
        let sweeper = sweeper_with(gateway, SweeperConfig::default());
        sweeper
            .tracker
            .record_arrival(ChatId(1), MessageId(1), UserId(1), at(0));
        sweeper
            .tracker
            .record_arrival(ChatId(2), MessageId(1), UserId(1), at(0));

        sweeper.sweep_at(at(100)).await;
        sweeper.sweep_at(at(400)).await;

        let stats = sweeper.stats().snapshot();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.expired, 2);
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.last_sweep_at, Some(at(400)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let gateway = Arc::new(RecordingGateway::new());
        let sweeper = Arc::new(sweeper_with(gateway, SweeperConfig::default()));
        let shutdown = CancellationToken::new();

        let handle = sweeper.clone().spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.cancel();
        handle.await.unwrap();

        // Immediate first tick plus one every 10s
        assert_eq!(sweeper.stats().snapshot().ticks, 3);
    }
}
