use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{PurgeError, Result};

/// Main configuration structure for purgebot
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Telegram Bot API configuration
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Retention policy defaults and bounds
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Expiry sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// `/start` welcome message configuration
    #[serde(default)]
    pub welcome: WelcomeConfig,
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists. Falls back to defaults when nothing is found.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in default_config_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PurgeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| PurgeError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        let retention = &self.retention;
        if retention.min_secs == 0 {
            return Err(PurgeError::Config(
                "retention.min_secs must be at least 1".to_string(),
            ));
        }
        if retention.default_secs < retention.min_secs {
            return Err(PurgeError::Config(format!(
                "retention.default_secs ({}) is below retention.min_secs ({})",
                retention.default_secs, retention.min_secs
            )));
        }
        if retention.max_secs != 0 && retention.max_secs < retention.default_secs {
            return Err(PurgeError::Config(format!(
                "retention.max_secs ({}) is below retention.default_secs ({})",
                retention.max_secs, retention.default_secs
            )));
        }
        if self.sweeper.interval_secs == 0 {
            return Err(PurgeError::Config(
                "sweeper.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.sweeper.max_concurrent_deletes == 0 {
            return Err(PurgeError::Config(
                "sweeper.max_concurrent_deletes must be at least 1".to_string(),
            ));
        }
        self.validate_listeners()?;
        check_url("telegram.api_url", &self.telegram.api_url)?;
        for (field, value) in [
            ("welcome.image_url", &self.welcome.image_url),
            ("welcome.button_url", &self.welcome.button_url),
        ] {
            if !value.is_empty() {
                check_url(field, value)?;
            }
        }
        Ok(())
    }

    fn validate_listeners(&self) -> Result<()> {
        let server = &self.server;
        let public = parse_addr("server.listen_addr", &server.listen_addr)?;
        let admin = parse_addr("server.admin_listen_addr", &server.admin_listen_addr)?;

        if public == admin {
            return Err(PurgeError::Config(format!(
                "server.admin_listen_addr must differ from server.listen_addr ({public})"
            )));
        }
        if server.admin_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(PurgeError::Config(
                "server.admin_token must not be empty".to_string(),
            ));
        }
        if !admin.ip().is_loopback() && server.admin_token.is_none() {
            return Err(PurgeError::Config(format!(
                "server.admin_listen_addr ({admin}) is not a loopback address; set server.admin_token"
            )));
        }
        Ok(())
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| PurgeError::Config(format!("{field} is not a valid address ({value}): {e}")))
}

fn check_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| PurgeError::Config(format!("{field} is not a valid URL ({value}): {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PurgeError::Config(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::home_dir().map(|h| h.join(".purgebot").join("config.toml")),
        dirs::config_dir().map(|c| c.join("purgebot").join("config.toml")),
        Some(PathBuf::from("config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    /// Environment variable holding the bot token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Bot API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Request timeout in seconds for API calls
    #[serde(default = "default_telegram_timeout_secs")]
    pub timeout_secs: u64,
    /// Secret expected in `X-Telegram-Bot-Api-Secret-Token` (unset = not checked)
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// Bot's own user id; resolved with `getMe` at startup when unset
    #[serde(default)]
    pub bot_user_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            api_url: default_api_url(),
            timeout_secs: default_telegram_timeout_secs(),
            webhook_secret: None,
            bot_user_id: None,
        }
    }
}

fn default_token_env() -> String {
    "PURGEBOT_TOKEN".to_string()
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout_secs() -> u64 {
    30
}

/// Retention policy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Retention applied to chats without an explicit policy
    #[serde(default = "default_retention_secs")]
    pub default_secs: u64,
    /// Smallest retention an admin may set
    #[serde(default = "default_min_secs")]
    pub min_secs: u64,
    /// Largest retention an admin may set (0 = unbounded)
    #[serde(default = "default_max_secs")]
    pub max_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            default_secs: default_retention_secs(),
            min_secs: default_min_secs(),
            max_secs: default_max_secs(),
        }
    }
}

fn default_retention_secs() -> u64 {
    300
}

fn default_min_secs() -> u64 {
    10
}

// Bots cannot delete other users' messages older than 48 hours.
fn default_max_secs() -> u64 {
    48 * 60 * 60
}

/// Expiry sweeper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweeperConfig {
    /// Seconds between sweep ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound for a single deletion call
    #[serde(default = "default_delete_timeout_secs")]
    pub delete_timeout_secs: u64,
    /// Deletion calls allowed in flight at once during a tick
    #[serde(default = "default_max_concurrent_deletes")]
    pub max_concurrent_deletes: usize,
    /// Drop chats with no pending messages from the tracker after a sweep
    #[serde(default = "default_prune_empty")]
    pub prune_empty: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            delete_timeout_secs: default_delete_timeout_secs(),
            max_concurrent_deletes: default_max_concurrent_deletes(),
            prune_empty: default_prune_empty(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

fn default_delete_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_deletes() -> usize {
    8
}

fn default_prune_empty() -> bool {
    true
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Webhook listener, the one Telegram (or a reverse proxy) reaches
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Operator API listener; keep it off the public interface
    #[serde(default = "default_admin_listen_addr")]
    pub admin_listen_addr: String,
    /// Bearer token required on `/admin/*` when set
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            admin_listen_addr: default_admin_listen_addr(),
            admin_token: None,
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_admin_listen_addr() -> String {
    "127.0.0.1:8081".to_string()
}

/// Welcome message sent in reply to `/start`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WelcomeConfig {
    /// Photo URL; when empty a plain text reply is sent instead
    #[serde(default)]
    pub image_url: String,
    /// Caption (or message text when no image is configured)
    #[serde(default = "default_caption")]
    pub caption: String,
    /// Inline button label; no button when empty
    #[serde(default)]
    pub button_text: String,
    /// Inline button target URL
    #[serde(default)]
    pub button_url: String,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            image_url: String::new(),
            caption: default_caption(),
            button_text: String::new(),
            button_url: String::new(),
        }
    }
}

fn default_caption() -> String {
    "This bot deletes group messages after a set time.\n\n\
     Admins can change the delay with /setdelay <seconds>. \
     Use /status to see the current setting."
        .to_string()
}
