//! Chat command surface
//!
//! Handles `/start`, `/help`, `/setdelay` and `/status`. Commands only touch
//! the retention state through [`PolicyStore::set`] and read pending counts
//! from the [`ArrivalTracker`]; the actual Telegram calls go through the
//! [`AdminDirectory`] and [`ReplySender`] traits.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::WelcomeConfig;
use crate::gateway::GatewayError;
use crate::retention::{ArrivalTracker, ChatId, ChatKind, MessageId, PolicyError, PolicyStore, UserId};
use crate::telegram::types::InlineKeyboardMarkup;

/// Looks up whether a user administers a chat
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn is_admin(&self, chat: ChatId, user: UserId) -> Result<bool, GatewayError>;
}

/// Sends command replies back into a chat
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> Result<(), GatewayError>;
}

/// Errors surfaced to the user who invoked a command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Only chat administrators can change the delete delay.")]
    PermissionDenied,

    #[error("Could not verify your admin status, please try again later.")]
    AdminLookup(GatewayError),

    #[error("{0}")]
    Policy(#[from] PolicyError),
}

/// A command recognised in a message's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/setdelay <seconds>`; the raw argument is kept for error messages
    SetDelay(Option<String>),
    Status,
}

/// `/name[@bot] args`, split but not yet interpreted
struct CommandText<'a> {
    name: &'a str,
    target: Option<&'a str>,
    args: &'a str,
}

fn split_command(text: &str) -> Option<CommandText<'_>> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };

    // Same shape as Telegram's bot_command entities
    let is_word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !is_word(name) || target.is_some_and(|t| !is_word(t)) {
        return None;
    }

    Some(CommandText { name, target, args })
}

/// Whether a message is a bot command (`/name`, `/name@bot`) rather than
/// chatter. Text like `/ lol` or `/-)` is chatter.
pub fn is_command(text: &str) -> bool {
    split_command(text).is_some()
}

impl Command {
    /// Parse a command, ignoring unknown ones and ones addressed to a
    /// different bot (`/status@otherbot`).
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let CommandText { name, target, args } = split_command(text)?;

        if let (Some(target), Some(ours)) = (target, bot_username)
            && !target.eq_ignore_ascii_case(ours)
        {
            return None;
        }

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "setdelay" | "setretention" => Some(Command::SetDelay(
                args.split_whitespace().next().map(str::to_string),
            )),
            "status" => Some(Command::Status),
            _ => None,
        }
    }
}

/// A command together with where and by whom it was sent
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub chat: ChatId,
    pub chat_kind: ChatKind,
    pub user: UserId,
    pub message_id: MessageId,
    pub command: Command,
}

/// Message to send back into a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Sent as a photo with `text` as caption when set
    pub photo_url: Option<String>,
    pub keyboard: Option<InlineKeyboardMarkup>,
    pub reply_to: Option<MessageId>,
}

impl Reply {
    pub fn text(text: impl Into<String>, reply_to: MessageId) -> Self {
        Self {
            text: text.into(),
            photo_url: None,
            keyboard: None,
            reply_to: Some(reply_to),
        }
    }
}

/// Retention summary for one chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub chat: ChatId,
    pub retention: Duration,
    pub custom: bool,
    pub pending: usize,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Messages in this chat are deleted after {}{}.",
            format_duration(self.retention),
            if self.custom { "" } else { " (default)" }
        )?;
        write!(f, "Pending deletion: {}", self.pending)
    }
}

/// Render a duration as e.g. `1h 5m`, `90s` becomes `1m 30s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return "0s".to_string();
    }

    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if seconds > 0 {
        parts.push(format!("{seconds}s"));
    }
    parts.join(" ")
}

const HELP_TEXT: &str = "I delete messages in this group once they get old.\n\n\
/status - show the current delete delay\n\
/setdelay <seconds> - change the delay (admins only)\n\
/help - show this message";

/// Executes chat commands against the retention state
pub struct CommandService {
    policies: Arc<PolicyStore>,
    tracker: Arc<ArrivalTracker>,
    admins: Arc<dyn AdminDirectory>,
    welcome: WelcomeConfig,
}

impl CommandService {
    pub fn new(
        policies: Arc<PolicyStore>,
        tracker: Arc<ArrivalTracker>,
        admins: Arc<dyn AdminDirectory>,
        welcome: WelcomeConfig,
    ) -> Self {
        Self {
            policies,
            tracker,
            admins,
            welcome,
        }
    }

    /// Change a chat's retention on behalf of `user`, who must be an admin
    pub async fn set_retention(
        &self,
        chat: ChatId,
        user: UserId,
        seconds: u64,
    ) -> Result<Duration, CommandError> {
        let is_admin = self
            .admins
            .is_admin(chat, user)
            .await
            .map_err(CommandError::AdminLookup)?;
        if !is_admin {
            tracing::info!(chat_id = %chat, user_id = %user, "Rejected retention change from non-admin");
            return Err(CommandError::PermissionDenied);
        }

        let retention = Duration::from_secs(seconds);
        self.policies.set(chat, retention)?;
        Ok(retention)
    }

    /// Current retention and pending count for a chat
    pub fn get_status(&self, chat: ChatId) -> StatusReport {
        StatusReport {
            chat,
            retention: self.policies.get(chat),
            custom: self.policies.is_custom(chat),
            pending: self.tracker.count(chat),
        }
    }

    /// Run a command and build the reply, if any
    pub async fn handle(&self, invocation: &CommandInvocation) -> Option<Reply> {
        let reply_to = invocation.message_id;
        match &invocation.command {
            Command::Start => Some(self.welcome_reply()),
            Command::Help => Some(Reply::text(HELP_TEXT, reply_to)),
            Command::Status => {
                if !invocation.chat_kind.is_tracked() {
                    return Some(Reply::text(
                        "Add me to a group and make me an admin to start deleting messages.",
                        reply_to,
                    ));
                }
                Some(Reply::text(self.get_status(invocation.chat).to_string(), reply_to))
            }
            Command::SetDelay(argument) => {
                if !invocation.chat_kind.is_tracked() {
                    return Some(Reply::text("This command only works in groups.", reply_to));
                }
                let Some(seconds) = argument.as_deref().and_then(|a| a.parse::<u64>().ok()) else {
                    return Some(Reply::text(
                        format!(
                            "Usage: /setdelay <seconds> (minimum {}s)",
                            self.policies.minimum().as_secs()
                        ),
                        reply_to,
                    ));
                };

                let text = match self.set_retention(invocation.chat, invocation.user, seconds).await {
                    Ok(retention) => format!(
                        "Messages will now be deleted after {}.",
                        format_duration(retention)
                    ),
                    Err(e) => e.to_string(),
                };
                Some(Reply::text(text, reply_to))
            }
        }
    }

    fn welcome_reply(&self) -> Reply {
        let keyboard = (!self.welcome.button_text.is_empty() && !self.welcome.button_url.is_empty())
            .then(|| InlineKeyboardMarkup::single_link(&self.welcome.button_text, &self.welcome.button_url));

        Reply {
            text: self.welcome.caption.clone(),
            photo_url: (!self.welcome.image_url.is_empty()).then(|| self.welcome.image_url.clone()),
            keyboard,
            reply_to: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticAdminDirectory;

    fn service_with(admins: StaticAdminDirectory) -> CommandService {
        CommandService::new(
            Arc::new(PolicyStore::default()),
            Arc::new(ArrivalTracker::new()),
            Arc::new(admins),
            WelcomeConfig::default(),
        )
    }

    fn invocation(command: Command, user: i64) -> CommandInvocation {
        CommandInvocation {
            chat: ChatId(-42),
            chat_kind: ChatKind::Supergroup,
            user: UserId(user),
            message_id: MessageId(5),
            command,
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", None), Some(Command::Start));
        assert_eq!(Command::parse("/help", None), Some(Command::Help));
        assert_eq!(Command::parse("/status", None), Some(Command::Status));
        assert_eq!(
            Command::parse("/setdelay 20", None),
            Some(Command::SetDelay(Some("20".into())))
        );
        assert_eq!(Command::parse("/setdelay", None), Some(Command::SetDelay(None)));
        assert_eq!(Command::parse("/unknown", None), None);
        assert_eq!(Command::parse("hello", None), None);
        assert_eq!(Command::parse("/", None), None);
    }

    #[test]
    fn test_parse_respects_bot_mention() {
        assert_eq!(
            Command::parse("/status@PurgeBot", Some("purgebot")),
            Some(Command::Status)
        );
        assert_eq!(Command::parse("/status@otherbot", Some("purgebot")), None);
        assert_eq!(Command::parse("/status@anything", None), Some(Command::Status));
    }

    #[test]
    fn test_is_command_requires_command_shape() {
        assert!(is_command("/status"));
        assert!(is_command("/unknown_cmd with args"));
        assert!(is_command("/status@purgebot"));
        assert!(is_command("  /setdelay\n20"));
        assert!(!is_command("/ lol"));
        assert!(!is_command("/-)"));
        assert!(!is_command("/"));
        assert!(!is_command("/status@"));
        assert!(!is_command("/a/b/c"));
        assert!(!is_command("hello /status"));
    }

    #[test]
    fn test_parse_argument_after_newline() {
        assert_eq!(
            Command::parse("/setdelay\n20", None),
            Some(Command::SetDelay(Some("20".into())))
        );
        assert_eq!(Command::parse("/-)", None), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(20)), "20s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_status_report_display() {
        let report = StatusReport {
            chat: ChatId(1),
            retention: Duration::from_secs(300),
            custom: false,
            pending: 3,
        };
        assert_eq!(
            report.to_string(),
            "Messages in this chat are deleted after 5m (default).\nPending deletion: 3"
        );
    }

    #[tokio::test]
    async fn test_admin_can_set_retention() {
        let service = service_with(StaticAdminDirectory::new().with_admin(ChatId(-42), UserId(1)));
        let retention = service.set_retention(ChatId(-42), UserId(1), 20).await.unwrap();
        assert_eq!(retention, Duration::from_secs(20));

        let status = service.get_status(ChatId(-42));
        assert_eq!(status.retention, Duration::from_secs(20));
        assert!(status.custom);
    }

    #[tokio::test]
    async fn test_non_admin_is_rejected() {
        let service = service_with(StaticAdminDirectory::new());
        let err = service.set_retention(ChatId(-42), UserId(2), 20).await.unwrap_err();
        assert_eq!(err, CommandError::PermissionDenied);
        assert!(!service.get_status(ChatId(-42)).custom);
    }

    #[tokio::test]
    async fn test_admin_lookup_failure_is_surfaced() {
        let service = service_with(StaticAdminDirectory::failing());
        let err = service.set_retention(ChatId(-42), UserId(1), 20).await.unwrap_err();
        assert!(matches!(err, CommandError::AdminLookup(_)));
    }

    #[tokio::test]
    async fn test_below_minimum_is_validation_error() {
        let service = service_with(StaticAdminDirectory::new().with_admin(ChatId(-42), UserId(1)));
        let err = service.set_retention(ChatId(-42), UserId(1), 5).await.unwrap_err();
        assert!(matches!(err, CommandError::Policy(PolicyError::BelowMinimum { .. })));
        assert_eq!(
            service.get_status(ChatId(-42)).retention,
            Duration::from_secs(300)
        );
    }

    #[tokio::test]
    async fn test_setdelay_reply_texts() {
        let service = service_with(StaticAdminDirectory::new().with_admin(ChatId(-42), UserId(1)));

        let reply = service
            .handle(&invocation(Command::SetDelay(Some("20".into())), 1))
            .await
            .unwrap();
        assert_eq!(reply.text, "Messages will now be deleted after 20s.");
        assert_eq!(reply.reply_to, Some(MessageId(5)));

        let reply = service
            .handle(&invocation(Command::SetDelay(Some("abc".into())), 1))
            .await
            .unwrap();
        assert_eq!(reply.text, "Usage: /setdelay <seconds> (minimum 10s)");

        let reply = service
            .handle(&invocation(Command::SetDelay(Some("20".into())), 2))
            .await
            .unwrap();
        assert_eq!(reply.text, "Only chat administrators can change the delete delay.");
    }

    #[tokio::test]
    async fn test_setdelay_in_private_chat() {
        let service = service_with(StaticAdminDirectory::new());
        let mut inv = invocation(Command::SetDelay(Some("20".into())), 1);
        inv.chat_kind = ChatKind::Private;
        let reply = service.handle(&inv).await.unwrap();
        assert_eq!(reply.text, "This command only works in groups.");
    }

    #[tokio::test]
    async fn test_start_uses_welcome_config() {
        let welcome = WelcomeConfig {
            image_url: "https://example.com/a.jpg".into(),
            caption: "hi".into(),
            button_text: "View Source".into(),
            button_url: "https://example.com/src".into(),
        };
        let service = CommandService::new(
            Arc::new(PolicyStore::default()),
            Arc::new(ArrivalTracker::new()),
            Arc::new(StaticAdminDirectory::new()),
            welcome,
        );

        let reply = service.handle(&invocation(Command::Start, 1)).await.unwrap();
        assert_eq!(reply.text, "hi");
        assert_eq!(reply.photo_url.as_deref(), Some("https://example.com/a.jpg"));
        assert_eq!(
            reply.keyboard,
            Some(InlineKeyboardMarkup::single_link("View Source", "https://example.com/src"))
        );
    }

    #[tokio::test]
    async fn test_start_without_image_is_plain_text() {
        let service = service_with(StaticAdminDirectory::new());
        let reply = service.handle(&invocation(Command::Start, 1)).await.unwrap();
        assert!(reply.photo_url.is_none());
        assert!(reply.keyboard.is_none());
    }
}
