//! Retention state: per-chat policies and pending message queues

pub mod policy;
pub mod tracker;
pub mod types;

pub use policy::{PolicyError, PolicyStore};
pub use tracker::{ArrivalTracker, Drained, PendingMessage};
pub use types::{ChatId, ChatKind, MessageId, UserId};
