use clap::Parser;

use crate::client::AdminClient;
use crate::commands::status::print_status;
use crate::error::CliResult;
use crate::output::{OutputFormat, format_secs};

#[derive(Parser)]
pub struct RetentionCommand {
    #[clap(help = "Telegram chat id (group ids are negative)", allow_negative_numbers = true)]
    pub chat_id: i64,

    #[clap(help = "New retention window in seconds")]
    pub seconds: u64,
}

impl RetentionCommand {
    pub async fn execute(&self, client: &AdminClient, format: OutputFormat) -> CliResult<()> {
        let status = client.set_retention(self.chat_id, self.seconds).await?;

        if let OutputFormat::Table = format {
            println!(
                "Chat {} now deletes messages after {}\n",
                status.chat_id,
                format_secs(status.retention_secs)
            );
        }
        print_status(&status, format)
    }
}
