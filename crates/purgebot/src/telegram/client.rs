//! Telegram Bot API client
//!
//! Thin reqwest wrapper around the handful of Bot API methods purgebot uses.
//! It implements [`DeletionGateway`], [`AdminDirectory`] and [`ReplySender`]
//! so the rest of the crate never sees HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;
use tracing::debug;

use crate::commands::{AdminDirectory, Reply, ReplySender};
use crate::config::TelegramConfig;
use crate::error::{PurgeError, Result};
use crate::gateway::{DeletionGateway, GatewayError};
use crate::retention::{ChatId, MessageId, UserId};
use crate::telegram::types::{ApiResponse, ChatMember, InlineKeyboardMarkup, Message, User};

/// Bot API client bound to one bot token
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    /// `{api_url}/bot{token}`; never logged
    endpoint: String,
}

#[derive(Serialize)]
struct DeleteMessageParams {
    chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct GetChatMemberParams {
    chat_id: i64,
    user_id: i64,
}

#[derive(Serialize)]
struct ReplyParameters {
    message_id: i64,
    allow_sending_without_reply: bool,
}

#[derive(Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct SendPhotoParams<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct NoParams {}

impl TelegramClient {
    /// Create a client for the given token
    pub fn new(config: &TelegramConfig, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PurgeError::Telegram(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", config.api_url.trim_end_matches('/'), token),
        })
    }

    /// Create a client with the token read from `config.token_env`
    pub fn from_env(config: &TelegramConfig) -> Result<Self> {
        let token = env::var(&config.token_env).map_err(|_| {
            PurgeError::Config(format!("Bot token env var '{}' not set", config.token_env))
        })?;
        if token.trim().is_empty() {
            return Err(PurgeError::Config(format!(
                "Bot token env var '{}' is empty",
                config.token_env
            )));
        }
        Self::new(config, token.trim())
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> std::result::Result<T, GatewayError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "Calling Bot API");

        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, method))
            .json(params)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            GatewayError::Transport(format!(
                "Invalid {method} response (HTTP {status}): {}",
                e.without_url()
            ))
        })?;

        if body.ok {
            return body
                .result
                .ok_or_else(|| GatewayError::Transport(format!("{method} returned no result")));
        }

        Err(classify_error(
            body.error_code.unwrap_or(i64::from(status.as_u16())),
            body.description.unwrap_or_default(),
            body.parameters.and_then(|p| p.retry_after),
        ))
    }

    /// Identity of the bot owning the token
    pub async fn get_me(&self) -> std::result::Result<User, GatewayError> {
        self.call("getMe", &NoParams {}).await
    }

    pub async fn delete_message(
        &self,
        chat: ChatId,
        message: MessageId,
    ) -> std::result::Result<(), GatewayError> {
        let _: bool = self
            .call(
                "deleteMessage",
                &DeleteMessageParams {
                    chat_id: chat.0,
                    message_id: message.0,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn get_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> std::result::Result<ChatMember, GatewayError> {
        self.call(
            "getChatMember",
            &GetChatMemberParams {
                chat_id: chat.0,
                user_id: user.0,
            },
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> std::result::Result<Message, GatewayError> {
        self.call(
            "sendMessage",
            &SendMessageParams {
                chat_id: chat.0,
                text,
                reply_parameters: reply_to.map(reply_parameters),
                reply_markup: keyboard,
            },
        )
        .await
    }

    pub async fn send_photo(
        &self,
        chat: ChatId,
        photo_url: &str,
        caption: &str,
        reply_to: Option<MessageId>,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> std::result::Result<Message, GatewayError> {
        self.call(
            "sendPhoto",
            &SendPhotoParams {
                chat_id: chat.0,
                photo: photo_url,
                caption,
                reply_parameters: reply_to.map(reply_parameters),
                reply_markup: keyboard,
            },
        )
        .await
    }
}

fn reply_parameters(message: MessageId) -> ReplyParameters {
    ReplyParameters {
        message_id: message.0,
        allow_sending_without_reply: true,
    }
}

// The request URL carries the bot token, keep it out of error messages.
fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.without_url().to_string())
    }
}

/// Map a Bot API error to a [`GatewayError`]
pub fn classify_error(code: i64, description: String, retry_after: Option<u64>) -> GatewayError {
    let lower = description.to_lowercase();

    if code == 429 {
        return GatewayError::RateLimited {
            retry_after: retry_after.unwrap_or(1),
        };
    }
    if lower.contains("message to delete not found")
        || lower.contains("message can't be deleted")
        || lower.contains("message_id_invalid")
    {
        return GatewayError::NotFound(description);
    }
    if code == 403 || lower.contains("not enough rights") || lower.contains("have no rights") {
        return GatewayError::Forbidden(description);
    }

    GatewayError::Api { code, description }
}

#[async_trait]
impl DeletionGateway for TelegramClient {
    async fn delete(&self, chat: ChatId, message: MessageId) -> std::result::Result<(), GatewayError> {
        self.delete_message(chat, message).await
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[async_trait]
impl AdminDirectory for TelegramClient {
    async fn is_admin(&self, chat: ChatId, user: UserId) -> std::result::Result<bool, GatewayError> {
        Ok(self.get_chat_member(chat, user).await?.is_admin())
    }
}

#[async_trait]
impl ReplySender for TelegramClient {
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> std::result::Result<(), GatewayError> {
        match &reply.photo_url {
            Some(url) => {
                self.send_photo(chat, url, &reply.text, reply.reply_to, reply.keyboard.as_ref())
                    .await?
            }
            None => {
                self.send_message(chat, &reply.text, reply.reply_to, reply.keyboard.as_ref())
                    .await?
            }
        };
        Ok(())
    }
}
