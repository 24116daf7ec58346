use chrono::{DateTime, Utc};
use std::time::Duration;

use purgebot_server::commands::format_duration;

#[derive(Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `300` -> `5m`, `0` -> `0s`
pub fn format_secs(secs: u64) -> String {
    format_duration(Duration::from_secs(secs))
}
