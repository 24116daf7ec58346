//! HTTP server: Telegram webhook, health checks and the admin API
//!
//! Two listeners:
//! - public (`server.listen_addr`): `GET /`, `GET /health`, `POST /webhook`
//! - admin (`server.admin_listen_addr`): `/admin/*` for `purgebot-cli`,
//!   behind a bearer token when `server.admin_token` is set

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::admin::handlers::{chat_status_handler, set_retention_handler, stats_handler};
use crate::commands::{Command, CommandInvocation, CommandService, ReplySender, is_command};
use crate::config::ServerConfig;
use crate::error::{PurgeError, Result};
use crate::ingest::{InboundMessage, Ingested, Ingestor};
use crate::retention::{ArrivalTracker, PolicyStore};
use crate::sweeper::SweepStats;
use crate::telegram::Update;

/// Header Telegram uses to echo the webhook secret
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared application state for all handlers
pub struct AppState {
    pub policies: Arc<PolicyStore>,
    pub tracker: Arc<ArrivalTracker>,
    pub ingestor: Ingestor,
    pub commands: CommandService,
    pub replies: Arc<dyn ReplySender>,
    pub sweep_stats: Arc<SweepStats>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`; unchecked when `None`
    pub webhook_secret: Option<String>,
    /// Bearer token for `/admin/*`; unchecked when `None`
    pub admin_token: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// The daemon's HTTP front end
pub struct WebhookServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl WebhookServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Serve both listeners until Ctrl+C/SIGTERM, then cancel `shutdown`
    /// for the other tasks
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<()> {
        let public = bind(&self.config.listen_addr).await?;
        let admin = bind(&self.config.admin_listen_addr).await?;

        if self.state.webhook_secret.is_none() {
            tracing::warn!("No webhook secret configured, webhook requests are not authenticated");
        }
        if self.state.admin_token.is_none() {
            tracing::info!("No admin token configured, the admin API relies on its loopback bind");
        }

        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => signal_token.cancel(),
                _ = signal_token.cancelled() => {},
            }
        });

        let public_token = shutdown.clone();
        let public_server = axum::serve(public, create_router(self.state.clone()))
            .with_graceful_shutdown(async move { public_token.cancelled().await })
            .into_future();

        let admin_token = shutdown.clone();
        let admin_server = axum::serve(admin, create_admin_router(self.state.clone()))
            .with_graceful_shutdown(async move { admin_token.cancelled().await })
            .into_future();

        let served = tokio::try_join!(public_server, admin_server);
        shutdown.cancel();
        served.map_err(|e| PurgeError::Server(format!("HTTP server failed: {e}")))?;

        tracing::info!("HTTP server shut down gracefully");
        Ok(())
    }
}

async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| PurgeError::Config(format!("Invalid listen address {addr}: {e}")))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PurgeError::Server(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Listening on {addr}");
    Ok(listener)
}

/// Router for the public listener: webhook and health checks only
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for the admin listener
pub fn create_admin_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/stats", get(stats_handler))
        .route("/admin/chats/{chat_id}", get(chat_status_handler))
        .route("/admin/chats/{chat_id}/retention", put(set_retention_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin_token))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_admin_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response<Body> {
    if let Some(expected) = &state.admin_token {
        let provided = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if provided != Some(expected.as_str()) {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request without a valid token");
            return create_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Missing or invalid admin token",
            );
        }
    }

    next.run(request).await
}

async fn root_handler() -> &'static str {
    "Bot is running!"
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Receive one Telegram update
///
/// Well-formed, authorised updates are always acknowledged with 200 so
/// Telegram does not redeliver updates we chose to ignore. Commands run in
/// the background so the acknowledgement never waits on Bot API calls.
async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Body> {
    if let Some(expected) = &state.webhook_secret {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            tracing::warn!("Rejected webhook request with missing or wrong secret");
            return create_error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_secret",
                "Missing or invalid webhook secret",
            );
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!("Malformed update: {e}");
            return create_error_response(
                StatusCode::BAD_REQUEST,
                "invalid_update",
                &format!("Malformed update: {e}"),
            );
        }
    };

    handle_update(&state, update);
    Json(serde_json::json!({"ok": true})).into_response()
}

/// Route an update to the command surface or the arrival tracker
///
/// Arrivals are recorded before this returns. Commands are spawned; the
/// handle of the spawned task is returned.
pub fn handle_update(state: &Arc<AppState>, update: Update) -> Option<JoinHandle<()>> {
    let Some(message) = update.message else {
        tracing::trace!(update_id = update.update_id, "Ignoring non-message update");
        return None;
    };

    let event = match InboundMessage::try_from(&message) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(update_id = update.update_id, "Rejected inbound message: {e}");
            return None;
        }
    };

    if let Some(text) = event.text.as_deref()
        && is_command(text)
    {
        let username = state
            .ingestor
            .identity()
            .and_then(|bot| bot.username.as_deref());
        let command = Command::parse(text, username)?;

        let state = state.clone();
        return Some(tokio::spawn(async move {
            run_command(&state, &event, command).await;
        }));
    }

    match state.ingestor.accept(&event) {
        Ingested::Tracked => {}
        Ingested::UntrackedChat(kind) => {
            tracing::trace!(chat_id = %event.chat_id, kind = kind.as_str(), "Ignoring message outside a group");
        }
        Ingested::SelfAuthored => {
            tracing::trace!(chat_id = %event.chat_id, "Ignoring own message");
        }
    }
    None
}

async fn run_command(state: &AppState, event: &InboundMessage, command: Command) {
    tracing::debug!(chat_id = %event.chat_id, user_id = %event.author_id, ?command, "Handling command");

    let invocation = CommandInvocation {
        chat: event.chat_id,
        chat_kind: event.chat_kind,
        user: event.author_id,
        message_id: event.message_id,
        command,
    };

    if let Some(reply) = state.commands.handle(&invocation).await
        && let Err(e) = state.replies.send_reply(event.chat_id, &reply).await
    {
        tracing::warn!(chat_id = %event.chat_id, "Failed to send reply: {e}");
    }
}

/// Create a JSON error response
pub(crate) fn create_error_response(status: StatusCode, error_type: &str, message: &str) -> Response<Body> {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
        }
    });

    (status, Json(body)).into_response()
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::WelcomeConfig;
    use crate::testing::{RecordingGateway, StaticAdminDirectory};

    fn create_test_state(webhook_secret: Option<&str>) -> Arc<AppState> {
        build_state(webhook_secret, None, Arc::new(RecordingGateway::new()))
    }

    fn build_state(
        webhook_secret: Option<&str>,
        admin_token: Option<&str>,
        replies: Arc<RecordingGateway>,
    ) -> Arc<AppState> {
        let policies = Arc::new(PolicyStore::default());
        let tracker = Arc::new(ArrivalTracker::new());

        Arc::new(AppState {
            policies: policies.clone(),
            tracker: tracker.clone(),
            ingestor: Ingestor::new(tracker.clone(), None),
            commands: CommandService::new(
                policies,
                tracker,
                Arc::new(StaticAdminDirectory::new()),
                WelcomeConfig::default(),
            ),
            replies,
            sweep_stats: Arc::new(SweepStats::default()),
            webhook_secret: webhook_secret.map(str::to_string),
            admin_token: admin_token.map(str::to_string),
            started_at: Utc::now(),
        })
    }

    fn group_text(text: &str) -> Update {
        serde_json::from_value(serde_json::json!({
            "update_id": 2,
            "message": {
                "message_id": 1002,
                "date": 1_700_000_000,
                "chat": {"id": 42, "type": "group"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ann"},
                "text": text
            }
        }))
        .unwrap()
    }

    fn put_retention(token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("PUT")
            .uri("/admin/chats/42/retention")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder
            .body(Body::from(r#"{"seconds": 60}"#))
            .unwrap()
    }

    fn group_update() -> String {
        serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1001,
                "date": 1_700_000_000,
                "chat": {"id": 42, "type": "group"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ann"},
                "text": "hello"
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state(None));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(body_str.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_root_reports_running() {
        let app = create_router(create_test_state(None));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body_bytes[..], b"Bot is running!");
    }

    #[tokio::test]
    async fn test_webhook_tracks_group_message() {
        let state = create_test_state(None);
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(group_update()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.tracker.count(crate::retention::ChatId(42)), 1);
    }

    #[tokio::test]
    async fn test_webhook_secret_is_enforced() {
        let state = create_test_state(Some("s3cret"));

        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(SECRET_TOKEN_HEADER, "wrong")
                    .body(Body::from(group_update()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(state.tracker.total_pending(), 0);

        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header(SECRET_TOKEN_HEADER, "s3cret")
                    .body(Body::from(group_update()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.tracker.total_pending(), 1);
    }

    #[tokio::test]
    async fn test_malformed_update_is_bad_request() {
        let app = create_router(create_test_state(None));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_message_update_is_acknowledged() {
        let state = create_test_state(None);

        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from(r#"{"update_id": 9}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.tracker.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_admin_routes_are_not_on_public_listener() {
        let app = create_router(create_test_state(None));

        let response = app
            .oneshot(Request::builder().uri("/admin/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_token_is_enforced() {
        let state = build_state(None, Some("opensesame"), Arc::new(RecordingGateway::new()));
        let chat = crate::retention::ChatId(42);

        let response = create_admin_router(state.clone())
            .oneshot(put_retention(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!state.policies.is_custom(chat));

        let response = create_admin_router(state.clone())
            .oneshot(put_retention(Some("guess")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(!state.policies.is_custom(chat));

        let response = create_admin_router(state.clone())
            .oneshot(put_retention(Some("opensesame")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.policies.get(chat), std::time::Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_admin_health_needs_no_token() {
        let state = build_state(None, Some("opensesame"), Arc::new(RecordingGateway::new()));

        let response = create_admin_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_slash_text_that_is_not_a_command_is_tracked() {
        let state = create_test_state(None);

        assert!(handle_update(&state, group_text("/ lol")).is_none());
        assert!(handle_update(&state, group_text("/-)")).is_none());

        assert_eq!(state.tracker.count(crate::retention::ChatId(42)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_webhook_acknowledges_before_command_reply() {
        let replies = Arc::new(
            RecordingGateway::new().with_reply_delay(std::time::Duration::from_secs(30)),
        );
        let state = build_state(None, None, replies.clone());

        let response = create_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_string(&serde_json::json!({
                            "update_id": 3,
                            "message": {
                                "message_id": 1003,
                                "date": 1_700_000_000,
                                "chat": {"id": 42, "type": "group"},
                                "from": {"id": 7, "is_bot": false, "first_name": "Ann"},
                                "text": "/help"
                            }
                        }))
                        .unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(replies.replies().is_empty());

        let handle = handle_update(&state, group_text("/help")).unwrap();
        assert!(replies.replies().is_empty());
        handle.await.unwrap();
        assert!(!replies.replies().is_empty());
        assert_eq!(state.tracker.total_pending(), 0);
    }
}
