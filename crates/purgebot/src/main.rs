//! purgebot daemon - deletes Telegram group messages once they get old

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use purgebot_server::commands::CommandService;
use purgebot_server::config::Config;
use purgebot_server::error::{PurgeError, Result};
use purgebot_server::ingest::{BotIdentity, Ingestor};
use purgebot_server::retention::{ArrivalTracker, PolicyStore, UserId};
use purgebot_server::server::{AppState, WebhookServer};
use purgebot_server::sweeper::Sweeper;
use purgebot_server::telegram::TelegramClient;

/// purgebot - Telegram bot that deletes group messages after a delay
#[derive(Parser)]
#[command(name = "purgebot")]
#[command(about = "A Telegram bot that deletes group messages once their retention window elapses")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the bot (default command)
    #[command(name = "serve")]
    Serve,
    /// Validate the configuration and print the effective values
    #[command(name = "check-config")]
    CheckConfig,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
        Some(Command::CheckConfig) => check_config(cli.config),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,purgebot_server=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn check_config(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| PurgeError::Serialization(format!("Failed to render config: {e}")))?;
    println!("{rendered}");

    match std::env::var(&config.telegram.token_env) {
        Ok(token) if !token.trim().is_empty() => {
            println!("# bot token: set via ${}", config.telegram.token_env);
        }
        _ => println!("# bot token: ${} is NOT set", config.telegram.token_env),
    }

    Ok(())
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting purgebot daemon");

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;
    tracing::debug!(
        retention = ?config.retention,
        sweeper = ?config.sweeper,
        server = ?config.server,
        "Config loaded"
    );

    let telegram = Arc::new(TelegramClient::from_env(&config.telegram)?);

    let identity = match config.telegram.bot_user_id {
        Some(id) => BotIdentity {
            id: UserId(id),
            username: None,
        },
        None => {
            let me = telegram.get_me().await?;
            tracing::info!(bot_id = me.id, username = ?me.username, "Authenticated with Telegram");
            BotIdentity {
                id: UserId(me.id),
                username: me.username,
            }
        }
    };

    let policies = Arc::new(PolicyStore::new(&config.retention));
    let tracker = Arc::new(ArrivalTracker::new());

    let sweeper = Arc::new(Sweeper::new(
        policies.clone(),
        tracker.clone(),
        telegram.clone(),
        config.sweeper.clone(),
    ));
    let sweep_stats = sweeper.stats();

    let shutdown = CancellationToken::new();
    let sweeper_handle = sweeper.spawn(shutdown.clone());

    let state = Arc::new(AppState {
        policies: policies.clone(),
        tracker: tracker.clone(),
        ingestor: Ingestor::new(tracker.clone(), Some(identity)),
        commands: CommandService::new(
            policies,
            tracker,
            telegram.clone(),
            config.welcome.clone(),
        ),
        replies: telegram,
        sweep_stats,
        webhook_secret: config.telegram.webhook_secret.clone(),
        admin_token: config.server.admin_token.clone(),
        started_at: Utc::now(),
    });

    let server = WebhookServer::new(config.server.clone(), state);
    let served = server.serve(shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        tracing::error!("Sweeper task failed: {e}");
    }

    served?;
    tracing::info!("purgebot daemon stopped");
    Ok(())
}
