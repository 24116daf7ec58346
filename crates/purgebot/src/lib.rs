//! purgebot - Telegram group message retention daemon
//!
//! Tracks messages posted in group chats and deletes each one once its
//! chat's retention window has elapsed. The engine is split into a policy
//! store, an arrival tracker, and a periodic sweeper that talks to the
//! platform through the [`gateway::DeletionGateway`] trait.

pub mod admin;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ingest;
pub mod retention;
pub mod server;
pub mod sweeper;
pub mod telegram;
pub mod testing;

pub use error::{PurgeError, Result};
