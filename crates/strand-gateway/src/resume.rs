// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resumption handler.
//!
//! A reconnecting client asks for the most recent generation of a chat.
//! Three outcomes: reattach to a live stream (200, frames verbatim),
//! replay the just-finished reply from storage (200, one synthetic
//! append-message frame), or nothing to resume (204). Resumption is a
//! best-effort enhancement: a missing broker degrades to 204, never to
//! an error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use strand_core::{ErrorSurface, Frame, Message, Role, Visibility};
use strand_storage::queries::{chats, messages, streams};
use tracing::debug;
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::orchestrator::sse_response;
use crate::server::AppState;

pub async fn resume(state: AppState, caller: Caller, chat_id: &str) -> Result<Response, ApiError> {
    if Uuid::parse_str(chat_id).is_err() {
        return Err(ApiError::bad_request(ErrorSurface::Api, "Invalid chat id."));
    }

    let chat = chats::get_chat(&state.db, chat_id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorSurface::Chat, "Chat not found."))?;

    if chat.user_id != caller.user_id && chat.visibility != Visibility::Public {
        return Err(ApiError::forbidden(
            ErrorSurface::Chat,
            "You do not own this chat.",
        ));
    }

    if !state.stream.resumable || !state.broker.is_available() {
        debug!(chat_id, "resumable transport not configured, nothing to resume");
        return Ok(empty_response());
    }

    let stream_ids = streams::list_stream_ids_by_chat(&state.db, chat_id).await?;
    let Some(latest) = stream_ids.last() else {
        return Ok(empty_response());
    };

    // Live or buffered topic: continue it verbatim.
    if let Some(frames) = state.broker.subscribe(latest).await? {
        debug!(chat_id, stream_id = %latest, "reattaching to live stream");
        return Ok(sse_response(frames));
    }

    // Topic concluded. Replay the stored reply only when it is actually
    // the reply the client was waiting for: assistant-authored and fresh.
    let Some(message) = messages::latest_message(&state.db, chat_id).await? else {
        return Ok(empty_response());
    };
    if message.role != Role::Assistant {
        return Ok(empty_response());
    }
    if is_stale(&message, state.stream.staleness_secs) {
        debug!(chat_id, message_id = %message.id, "last reply is stale, nothing to resume");
        return Ok(empty_response());
    }

    debug!(chat_id, message_id = %message.id, "replaying completed reply");
    Ok(sse_response(futures::stream::iter(vec![
        Frame::AppendMessage { message },
    ])))
}

fn empty_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// True when the message's age exceeds the staleness window, or its
/// timestamp cannot be parsed at all.
fn is_stale(message: &Message, staleness_secs: u64) -> bool {
    let Ok(created) = DateTime::parse_from_rfc3339(&message.created_at) else {
        return true;
    };
    let age = Utc::now().signed_duration_since(created);
    age.num_seconds() < 0 || age.num_seconds() as u64 > staleness_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::now_rfc3339;

    fn message_at(created_at: &str) -> Message {
        Message {
            id: "m1".into(),
            chat_id: "c1".into(),
            role: Role::Assistant,
            parts: vec![],
            content: "hi".into(),
            attachments: vec![],
            created_at: created_at.into(),
        }
    }

    #[test]
    fn fresh_message_is_not_stale() {
        let msg = message_at(&now_rfc3339());
        assert!(!is_stale(&msg, 15));
    }

    #[test]
    fn old_message_is_stale() {
        let old = (Utc::now() - chrono::Duration::seconds(60))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let msg = message_at(&old);
        assert!(is_stale(&msg, 15));
    }

    #[test]
    fn unparseable_timestamp_is_stale() {
        let msg = message_at("not-a-timestamp");
        assert!(is_stale(&msg, 15));
    }
}
