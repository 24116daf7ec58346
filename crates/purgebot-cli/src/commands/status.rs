use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use purgebot_server::admin::ChatStatus;

use crate::client::AdminClient;
use crate::error::CliResult;
use crate::output::{OutputFormat, format_secs};

#[derive(Parser)]
pub struct StatusCommand {
    #[clap(help = "Telegram chat id (group ids are negative)", allow_negative_numbers = true)]
    pub chat_id: i64,
}

impl StatusCommand {
    pub async fn execute(&self, client: &AdminClient, format: OutputFormat) -> CliResult<()> {
        let status = client.chat_status(self.chat_id).await?;
        print_status(&status, format)
    }
}

pub(crate) fn print_status(status: &ChatStatus, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(status)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(["Chat", "Retention", "Source", "Pending"]);

            table.add_row([
                status.chat_id.to_string(),
                format_secs(status.retention_secs),
                if status.custom { "custom" } else { "default" }.to_string(),
                status.pending.to_string(),
            ]);

            println!("{table}");
        }
    }

    Ok(())
}
