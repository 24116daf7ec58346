//! Telegram Bot API integration

mod client;
pub mod types;

pub use client::{TelegramClient, classify_error};
pub use types::{Update, User};
