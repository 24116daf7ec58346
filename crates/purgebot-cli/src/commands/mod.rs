pub mod retention;
pub mod stats;
pub mod status;

pub use retention::RetentionCommand;
pub use stats::StatsCommand;
pub use status::StatusCommand;
