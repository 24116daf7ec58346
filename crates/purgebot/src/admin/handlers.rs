use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::admin::{AdminStats, ChatStatus, RetentionUpdate};
use crate::retention::ChatId;
use crate::server::{AppState, create_error_response};

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<AdminStats> {
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(AdminStats {
        tracked_chats: state.tracker.conversations().len() as u64,
        pending_messages: state.tracker.total_pending() as u64,
        custom_policies: state.policies.overrides() as u64,
        default_retention_secs: state.policies.default_retention().as_secs(),
        min_retention_secs: state.policies.minimum().as_secs(),
        max_retention_secs: state.policies.maximum().map(|d| d.as_secs()),
        sweeper: state.sweep_stats.snapshot(),
        bot_user_id: state.ingestor.identity().map(|bot| bot.id.0),
        uptime_secs: uptime,
    })
}

pub async fn chat_status_handler(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
) -> Json<ChatStatus> {
    let report = state.commands.get_status(ChatId(chat_id));
    Json(ChatStatus::from(&report))
}

/// Operator override: sets the policy without a Telegram admin check
pub async fn set_retention_handler(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    Json(update): Json<RetentionUpdate>,
) -> Response<Body> {
    let chat = ChatId(chat_id);

    match state.policies.set(chat, Duration::from_secs(update.seconds)) {
        Ok(_) => {
            let report = state.commands.get_status(chat);
            Json(ChatStatus::from(&report)).into_response()
        }
        Err(e) => create_error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_retention",
            &e.to_string(),
        ),
    }
}
