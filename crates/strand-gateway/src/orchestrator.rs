// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The streaming turn state machine.
//!
//! One call to [`run_turn`] takes a validated request through quota check,
//! idempotent chat creation, inbound persistence, token production, fan-out
//! to the live response, and outbound persistence. Failures before the
//! first byte is committed surface as typed HTTP errors; failures after
//! that degrade to an inline error frame on the already-open stream.

use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use futures::{Stream, StreamExt};
use strand_core::traits::{ChunkStream, StreamBroker};
use strand_core::{
    derive_plain_text, now_rfc3339, Attachment, Chat, ErrorSurface, Frame, HistoryMessage,
    Message, MessagePart, ProducerChunk, ProducerRequest, Role, StrandError, Visibility,
};
use strand_storage::queries::{chats, messages, streams};
use strand_storage::Database;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::handlers::ChatTurnRequest;
use crate::server::AppState;

/// Inline frame text for any failure after the response has committed.
pub const STREAM_ERROR_MESSAGE: &str = "An error occurred, please try again.";

/// System prompt for every turn.
const SYSTEM_PROMPT: &str =
    "You are a friendly assistant! Keep your responses concise and helpful.";

/// Derived-title length cap, in characters.
const TITLE_MAX_CHARS: usize = 80;

/// A turn request that passed schema validation.
#[derive(Debug)]
struct ValidatedTurn {
    chat_id: String,
    message_id: String,
    parts: Vec<MessagePart>,
    content: Option<String>,
    attachments: Vec<Attachment>,
    model: String,
    visibility: Visibility,
    project_id: Option<String>,
}

/// Run one full streaming turn. Returns the committed streaming response,
/// or a typed error for anything that failed before commit.
pub async fn run_turn(
    state: AppState,
    caller: Caller,
    body: ChatTurnRequest,
) -> Result<Response, ApiError> {
    let turn = validate_turn(&body, &state.default_model)?;

    // Entitlement gate: pure read, fails closed before any write.
    let count = messages::count_recent_user_messages(&state.db, &caller.user_id, 24).await?;
    let limit = caller.tier.daily_limit(&state.limits);
    if count >= limit {
        debug!(user_id = %caller.user_id, count, limit, "quota exceeded");
        return Err(ApiError::rate_limited(
            ErrorSurface::Chat,
            "You have exceeded your maximum number of messages for the day. Please try again later.",
        ));
    }

    let inbound_text = derive_plain_text(turn.content.as_deref(), &turn.parts);
    ensure_chat(&state.db, &caller, &turn, &inbound_text).await?;

    // Inbound persistence precedes any model call. The client-supplied
    // message id is the idempotency key, so a retry is a no-op.
    let user_message = Message {
        id: turn.message_id.clone(),
        chat_id: turn.chat_id.clone(),
        role: Role::User,
        parts: turn.parts.clone(),
        content: inbound_text,
        attachments: turn.attachments.clone(),
        created_at: now_rfc3339(),
    };
    let inserted = messages::insert_message(&state.db, &user_message).await?;
    if !inserted {
        debug!(message_id = %turn.message_id, "duplicate inbound message ignored");
    }

    let history = load_history(&state.db, &turn.chat_id, state.stream.max_history).await?;

    let stream_id = Uuid::new_v4().to_string();
    let created_at = now_rfc3339();
    let expires_at = (Utc::now() + ChronoDuration::hours(24))
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    streams::create_stream(
        &state.db,
        &strand_core::StreamRow {
            id: stream_id.clone(),
            chat_id: turn.chat_id.clone(),
            user_id: caller.user_id.clone(),
            status: strand_core::StreamStatus::Active,
            created_at,
            expires_at: Some(expires_at),
        },
    )
    .await?;

    let request = ProducerRequest {
        model: turn.model.clone(),
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        messages: history,
        max_tokens: 0,
        tools: None,
    };

    // The wall-clock ceiling covers the whole turn, including the opening
    // call to the producer: its own connect timeout can be far longer than
    // the ceiling, and a stalled upstream must not hold the turn open.
    let deadline = Instant::now() + Duration::from_secs(state.stream.turn_timeout_secs);

    // A producer that fails (or stalls) before yielding anything still gets
    // the committed-response treatment: the failure arrives as the stream's
    // only element and the drive loop turns it into an inline error frame.
    let chunks: ChunkStream =
        match tokio::time::timeout_at(deadline, state.producer.produce(request)).await {
            Ok(Ok(chunks)) => chunks,
            Ok(Err(e)) => {
                warn!(error = %e, chat_id = %turn.chat_id, "producer refused the request");
                Box::pin(futures::stream::iter(vec![Err(e)]))
            }
            Err(_) => {
                warn!(chat_id = %turn.chat_id, "producer stalled past the turn ceiling");
                Box::pin(futures::stream::iter(vec![Err(StrandError::Timeout {
                    duration: Duration::from_secs(state.stream.turn_timeout_secs),
                })]))
            }
        };

    info!(chat_id = %turn.chat_id, stream_id = %stream_id, model = %turn.model, "turn started");

    if state.stream.resumable && state.broker.is_available() {
        // Resumable path: a detached task drives production to completion
        // regardless of the client; the HTTP response is just one
        // subscriber, replaying the topic from its start.
        state.broker.open(&stream_id).await?;
        let subscription = state.broker.subscribe(&stream_id).await?;

        let sink = FrameSink::Broker {
            broker: Arc::clone(&state.broker),
            stream_id: stream_id.clone(),
        };
        let db = state.db.clone();
        let chat_id = turn.chat_id.clone();
        tokio::spawn(async move {
            drive(&db, &chat_id, &stream_id, chunks, sink, deadline).await;
        });

        match subscription {
            Some(frames) => Ok(sse_response(frames)),
            // Unreachable with the in-memory broker (the topic was just
            // opened), but a committed empty 200 is the contract anyway.
            None => Ok(sse_response(futures::stream::empty())),
        }
    } else {
        // One-shot path: the response consumes a channel fed by the drive
        // task. The client going away closes the channel, which the sink
        // reports so production stops promptly.
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = FrameSink::Channel(tx);
        let db = state.db.clone();
        let chat_id = turn.chat_id.clone();
        tokio::spawn(async move {
            drive(&db, &chat_id, &stream_id, chunks, sink, deadline).await;
        });

        let frames = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        Ok(sse_response(frames))
    }
}

/// Schema-check the turn without touching storage.
fn validate_turn(body: &ChatTurnRequest, default_model: &str) -> Result<ValidatedTurn, ApiError> {
    if Uuid::parse_str(&body.id).is_err() {
        return Err(ApiError::bad_request(ErrorSurface::Api, "Invalid chat id."));
    }
    if Uuid::parse_str(&body.message.id).is_err() {
        return Err(ApiError::bad_request(
            ErrorSurface::Api,
            "Invalid message id.",
        ));
    }
    if body.message.role != "user" {
        return Err(ApiError::bad_request(
            ErrorSurface::Api,
            "Only user messages are accepted.",
        ));
    }
    if body.selected_chat_model.is_empty() {
        return Err(ApiError::bad_request(
            ErrorSurface::Api,
            "No model selected.",
        ));
    }
    let visibility: Visibility = body
        .selected_visibility_type
        .parse()
        .map_err(|_| ApiError::bad_request(ErrorSurface::Api, "Invalid visibility."))?;

    // Unrecognized model ids fall back to the configured default rather
    // than failing the turn.
    let model = if body.selected_chat_model.starts_with("claude-") {
        body.selected_chat_model.clone()
    } else {
        debug!(selected = %body.selected_chat_model, "unrecognized model, using default");
        default_model.to_string()
    };

    // A malformed project id is a cosmetic client bug, not a reason to
    // fail the turn: treat it as absent.
    let project_id = body
        .project_id
        .as_deref()
        .filter(|p| Uuid::parse_str(p).is_ok())
        .map(str::to_string);

    Ok(ValidatedTurn {
        chat_id: body.id.clone(),
        message_id: body.message.id.clone(),
        parts: body.message.parts.clone(),
        content: body.message.content.clone(),
        attachments: body.message.attachments.clone(),
        model,
        visibility,
        project_id,
    })
}

/// Look up the chat; create it on true absence, reject foreign owners.
///
/// Creation is idempotent: the insert ignores a unique-constraint conflict
/// and the row is re-read, so a concurrent duplicate turn proceeds instead
/// of failing.
async fn ensure_chat(
    db: &Database,
    caller: &Caller,
    turn: &ValidatedTurn,
    inbound_text: &str,
) -> Result<(), ApiError> {
    if let Some(chat) = chats::get_chat(db, &turn.chat_id).await? {
        if chat.user_id != caller.user_id {
            return Err(ApiError::forbidden(
                ErrorSurface::Chat,
                "You do not own this chat.",
            ));
        }
        return Ok(());
    }

    let now = now_rfc3339();
    let chat = Chat {
        id: turn.chat_id.clone(),
        user_id: caller.user_id.clone(),
        title: derive_title(inbound_text),
        visibility: turn.visibility,
        project_id: turn.project_id.clone(),
        created_at: now.clone(),
        last_activity_at: now,
    };
    let created = chats::create_chat(db, &chat).await?;
    if !created {
        // Lost the creation race. The winner may have been a different
        // user, so re-check ownership before appending messages.
        let existing = chats::get_chat(db, &turn.chat_id).await?.ok_or_else(|| {
            ApiError::not_found(ErrorSurface::Chat, "Chat not found.")
        })?;
        if existing.user_id != caller.user_id {
            return Err(ApiError::forbidden(
                ErrorSurface::Chat,
                "You do not own this chat.",
            ));
        }
    }
    Ok(())
}

/// Title for a freshly created chat, from the first user message text.
fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "Untitled".to_string();
    }
    trimmed.chars().take(TITLE_MAX_CHARS).collect()
}

/// Last N chat messages, oldest first, as producer history.
async fn load_history(
    db: &Database,
    chat_id: &str,
    max_history: u32,
) -> Result<Vec<HistoryMessage>, ApiError> {
    let stored = messages::list_messages(db, chat_id, Some(i64::from(max_history))).await?;
    Ok(stored
        .into_iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| HistoryMessage {
            role: m.role,
            content: m.content,
        })
        .collect())
}

/// Where the drive loop delivers frames.
enum FrameSink {
    /// Publish to a broker topic; delivery never reports a lost client.
    Broker {
        broker: Arc<dyn StreamBroker>,
        stream_id: String,
    },
    /// Feed the response directly; a failed send means the client is gone.
    Channel(mpsc::UnboundedSender<Frame>),
}

impl FrameSink {
    /// Deliver one frame. Returns false when the consumer is gone and
    /// production should stop.
    async fn send(&self, frame: Frame) -> bool {
        match self {
            FrameSink::Broker { broker, stream_id } => {
                if let Err(e) = broker.publish(stream_id, frame).await {
                    warn!(stream_id = %stream_id, error = %e, "broker publish failed");
                }
                true
            }
            FrameSink::Channel(tx) => tx.send(frame).is_ok(),
        }
    }

    /// Conclude delivery. Ends subscriber tails on the broker path.
    async fn finish(&self) {
        if let FrameSink::Broker { broker, stream_id } = self {
            if let Err(e) = broker.close(stream_id).await {
                warn!(stream_id = %stream_id, error = %e, "broker close failed");
            }
        }
    }
}

/// Consume the producer to its end, forwarding frames and persisting the
/// assembled reply.
///
/// Persistence of the assistant message happens before the terminal frame
/// is delivered, so a consumer that has seen the whole body can rely on
/// the reply being durable. Everything after the response committed is
/// best-effort: failures are logged and surfaced only as an inline error
/// frame.
async fn drive(
    db: &Database,
    chat_id: &str,
    stream_id: &str,
    mut chunks: ChunkStream,
    sink: FrameSink,
    deadline: Instant,
) {
    let mut partial = String::new();
    let mut tool_parts: Vec<MessagePart> = Vec::new();
    let mut finished = false;

    loop {
        let next = match tokio::time::timeout_at(deadline, chunks.next()).await {
            Ok(next) => next,
            Err(_) => {
                // Turn ceiling hit: platform-level abort, not an
                // application error the client can distinguish.
                warn!(chat_id, stream_id, "turn exceeded wall-clock ceiling");
                let _ = sink
                    .send(Frame::Error {
                        message: STREAM_ERROR_MESSAGE.to_string(),
                    })
                    .await;
                break;
            }
        };

        match next {
            Some(Ok(ProducerChunk::TextDelta(delta))) => {
                partial.push_str(&delta);
                if !sink.send(Frame::TextDelta { delta }).await {
                    info!(chat_id, stream_id, "client gone, cancelling production");
                    break;
                }
            }
            Some(Ok(ProducerChunk::ToolCall { id, name, input })) => {
                tool_parts.push(MessagePart::ToolInvocation {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
                if !sink.send(Frame::ToolCall { id, name, input }).await {
                    info!(chat_id, stream_id, "client gone, cancelling production");
                    break;
                }
            }
            Some(Ok(ProducerChunk::Finish { text, usage })) => {
                persist_assistant(db, chat_id, &text, std::mem::take(&mut tool_parts)).await;
                streams::mark_stream_completed(db, stream_id).await;
                touch_chat(db, chat_id).await;
                let _ = sink.send(Frame::Finish { usage }).await;
                finished = true;
                break;
            }
            Some(Err(e)) => {
                warn!(chat_id, stream_id, error = %e, "producer error mid-stream");
                let _ = sink
                    .send(Frame::Error {
                        message: STREAM_ERROR_MESSAGE.to_string(),
                    })
                    .await;
                break;
            }
            // Producer ended without a Finish chunk.
            None => break,
        }
    }

    if !finished {
        // Errored, cancelled or timed out: retain whatever was produced.
        if !partial.is_empty() || !tool_parts.is_empty() {
            persist_assistant(db, chat_id, &partial, std::mem::take(&mut tool_parts)).await;
        }
        streams::mark_stream_completed(db, stream_id).await;
    }

    sink.finish().await;
    debug!(chat_id, stream_id, finished, "turn drive ended");
}

/// Best-effort assistant message write under a fresh server-generated id.
async fn persist_assistant(db: &Database, chat_id: &str, text: &str, tool_parts: Vec<MessagePart>) {
    let mut parts = Vec::with_capacity(tool_parts.len() + 1);
    if !text.is_empty() {
        parts.push(MessagePart::Text {
            text: text.to_string(),
        });
    }
    parts.extend(tool_parts);

    let message = Message {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        role: Role::Assistant,
        parts,
        content: text.to_string(),
        attachments: Vec::new(),
        created_at: now_rfc3339(),
    };

    // Tokens were already delivered; an error here must not unwind the
    // response.
    if let Err(e) = messages::insert_message(db, &message).await {
        warn!(chat_id, error = %e, "failed to persist assistant message");
    }
}

async fn touch_chat(db: &Database, chat_id: &str) {
    if let Err(e) = chats::touch_last_activity(db, chat_id).await {
        warn!(chat_id, error = %e, "failed to touch chat activity");
    }
}

/// Wrap a frame stream as `text/event-stream`, one JSON frame per event.
pub fn sse_response<S>(frames: S) -> Response
where
    S: Stream<Item = Frame> + Send + 'static,
{
    let events = frames.map(|frame| Event::default().json_data(&frame));
    Sse::new(events).into_response()
}
