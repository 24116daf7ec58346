use clap::{Parser, Subcommand};
use purgebot_cli::client::{AdminClient, DEFAULT_URL};
use purgebot_cli::commands::{RetentionCommand, StatsCommand, StatusCommand};
use purgebot_cli::error::CliResult;
use purgebot_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "purgebot-cli")]
#[command(about = "purgebot CLI - Management tool for the purgebot daemon")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(
        long,
        short,
        global = true,
        env = "PURGEBOT_URL",
        default_value = DEFAULT_URL,
        help = "Base URL of the daemon's admin listener"
    )]
    pub url: String,

    #[clap(
        long,
        global = true,
        env = "PURGEBOT_ADMIN_TOKEN",
        hide_env_values = true,
        help = "Bearer token matching the daemon's server.admin_token"
    )]
    pub token: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Show daemon statistics")]
    Stats(StatsCommand),

    #[clap(about = "Show the retention status of a chat")]
    Status(StatusCommand),

    #[clap(about = "Set a chat's retention window (operator override)")]
    Retention(RetentionCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let client = AdminClient::new(&cli.url, cli.token.clone())?;

    match &cli.command {
        Command::Stats(cmd) => cmd.execute(&client, format).await,
        Command::Status(cmd) => cmd.execute(&client, format).await,
        Command::Retention(cmd) => cmd.execute(&client, format).await,
    }
}
