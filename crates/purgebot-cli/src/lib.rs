pub mod client;
pub mod commands;
pub mod error;
pub mod output;

pub use client::AdminClient;
pub use commands::{RetentionCommand, StatsCommand, StatusCommand};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_secs, format_timestamp};
