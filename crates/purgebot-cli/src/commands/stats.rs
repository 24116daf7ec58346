use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::client::AdminClient;
use crate::error::CliResult;
use crate::output::{OutputFormat, format_secs, format_timestamp};

#[derive(Parser)]
pub struct StatsCommand {}

impl StatsCommand {
    pub async fn execute(&self, client: &AdminClient, format: OutputFormat) -> CliResult<()> {
        let stats = client.stats().await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            OutputFormat::Table => {
                println!("purgebot Statistics");
                println!("======================\n");

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Metric", "Value"]);

                let max = stats
                    .max_retention_secs
                    .map(format_secs)
                    .unwrap_or_else(|| "unbounded".to_string());
                let last_sweep = stats
                    .sweeper
                    .last_sweep_at
                    .as_ref()
                    .map(format_timestamp)
                    .unwrap_or_else(|| "never".to_string());

                table.add_row(["Tracked chats", &stats.tracked_chats.to_string()]);
                table.add_row(["Pending messages", &stats.pending_messages.to_string()]);
                table.add_row(["Custom policies", &stats.custom_policies.to_string()]);
                table.add_row(["Default retention", &format_secs(stats.default_retention_secs)]);
                table.add_row([
                    "Allowed retention",
                    &format!("{} - {max}", format_secs(stats.min_retention_secs)),
                ]);
                table.add_row(["Sweeps", &stats.sweeper.ticks.to_string()]);
                table.add_row(["Expired", &stats.sweeper.expired.to_string()]);
                table.add_row(["Deleted", &stats.sweeper.deleted.to_string()]);
                table.add_row(["Failed deletions", &stats.sweeper.failed.to_string()]);
                table.add_row(["Last sweep", &last_sweep]);

                println!("{table}\n");

                println!("Uptime: {}", format_secs(stats.uptime_secs));
            }
        }

        Ok(())
    }
}
