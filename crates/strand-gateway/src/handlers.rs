// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chat API.
//!
//! POST /chat runs a full streaming turn, GET /chat resumes one,
//! DELETE /chat removes a chat the caller owns.

use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use strand_core::{Attachment, ErrorSurface, MessagePart};
use strand_storage::queries::chats;
use tracing::info;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::orchestrator;
use crate::resume;
use crate::server::AppState;

/// Request body for POST /chat.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChatTurnRequest {
    /// Chat id. Created on first turn, reused afterwards.
    pub id: String,
    /// Optional project association; malformed values are treated as absent.
    #[serde(default)]
    pub project_id: Option<String>,
    /// The inbound user message.
    pub message: IncomingMessage,
    /// Model selection for this turn.
    pub selected_chat_model: String,
    /// Visibility applied when the chat is created by this turn.
    pub selected_visibility_type: String,
}

/// The user message within a turn request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IncomingMessage {
    /// Client-supplied id, used as the idempotency key.
    pub id: String,
    /// Direct plain-text content; wins over parts when both are present.
    #[serde(default)]
    pub content: Option<String>,
    /// Typed content segments.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
    /// Author role; only `user` is accepted over the wire.
    pub role: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Query parameters for GET /chat.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeQuery {
    pub chat_id: String,
}

/// Query parameters for DELETE /chat.
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: String,
}

/// Response body for DELETE /chat.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// POST /chat -- run one streaming turn.
pub async fn post_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<ChatTurnRequest>,
) -> Result<Response, ApiError> {
    orchestrator::run_turn(state, caller, body).await
}

/// GET /chat?chatId=... -- resume the most recent generation, if any.
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ResumeQuery>,
) -> Result<Response, ApiError> {
    resume::resume(state, caller, &query.chat_id).await
}

/// DELETE /chat?id=... -- remove a chat the caller owns.
pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, ApiError> {
    let chat = chats::get_chat(&state.db, &query.id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorSurface::Chat, "Chat not found."))?;

    if chat.user_id != caller.user_id {
        return Err(ApiError::forbidden(
            ErrorSurface::Chat,
            "You do not own this chat.",
        ));
    }

    chats::delete_chat(&state.db, &query.id).await?;
    info!(chat_id = %query.id, user_id = %caller.user_id, "chat deleted");

    Ok(Json(DeleteResponse { deleted: query.id }).into_response())
}

/// GET /health -- unauthenticated liveness probe.
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
