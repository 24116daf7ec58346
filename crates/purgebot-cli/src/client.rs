//! HTTP client for the daemon's `/admin` API

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use purgebot_server::admin::{AdminStats, ChatStatus, RetentionUpdate};

use crate::error::{CliError, CliResult};

pub const DEFAULT_URL: &str = "http://127.0.0.1:8081";

pub struct AdminClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl AdminClient {
    pub fn new(base_url: &str, token: Option<String>) -> CliResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn stats(&self) -> CliResult<AdminStats> {
        let response = self
            .request(Method::GET, "/admin/stats")
            .send()
            .await?;
        decode(response).await
    }

    pub async fn chat_status(&self, chat_id: i64) -> CliResult<ChatStatus> {
        let response = self
            .request(Method::GET, &format!("/admin/chats/{chat_id}"))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn set_retention(&self, chat_id: i64, seconds: u64) -> CliResult<ChatStatus> {
        let response = self
            .request(Method::PUT, &format!("/admin/chats/{chat_id}/retention"))
            .json(&RetentionUpdate { seconds })
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> CliResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        return Err(CliError(format!("Daemon returned {status}: {message}")));
    }

    Ok(serde_json::from_str(&body)?)
}
