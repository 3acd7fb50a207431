// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.
//!
//! Converts a reqwest response byte stream into typed [`StreamEvent`] variants
//! using the `eventsource-stream` crate for SSE protocol compliance.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use strand_core::StrandError;

use crate::types::{
    SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop, SseError, SseMessageDelta,
    SseMessageStart,
};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Initial message metadata (id, model, usage).
    MessageStart(SseMessageStart),
    /// A new content block begins.
    ContentBlockStart(SseContentBlockStart),
    /// Incremental update to a content block (text delta, JSON delta).
    ContentBlockDelta(SseContentBlockDelta),
    /// A content block has finished.
    ContentBlockStop(SseContentBlockStop),
    /// Message-level delta (stop_reason, usage update).
    MessageDelta(SseMessageDelta),
    /// The message is complete.
    MessageStop,
    /// Keep-alive ping.
    Ping,
    /// API error during streaming.
    Error(SseError),
}

fn decode<T: serde::de::DeserializeOwned>(
    event_name: &str,
    data: &str,
) -> Result<T, StrandError> {
    serde_json::from_str(data).map_err(|e| StrandError::Upstream {
        message: format!("failed to parse {event_name}: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parses a reqwest streaming response into a stream of typed [`StreamEvent`]s.
///
/// The response body is parsed as Server-Sent Events. Each SSE event is
/// deserialized into the appropriate [`StreamEvent`] variant based on the
/// event name. Unknown event types are silently skipped per Anthropic's
/// API versioning policy.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, StrandError>> + Send>> {
    let byte_stream = response.bytes_stream();
    let event_stream = byte_stream.eventsource();

    let mapped = event_stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                let parsed = match event.event.as_str() {
                    "message_start" => {
                        decode::<SseMessageStart>("message_start", &event.data)
                            .map(StreamEvent::MessageStart)
                    }
                    "content_block_start" => {
                        decode::<SseContentBlockStart>("content_block_start", &event.data)
                            .map(StreamEvent::ContentBlockStart)
                    }
                    "content_block_delta" => {
                        decode::<SseContentBlockDelta>("content_block_delta", &event.data)
                            .map(StreamEvent::ContentBlockDelta)
                    }
                    "content_block_stop" => {
                        decode::<SseContentBlockStop>("content_block_stop", &event.data)
                            .map(StreamEvent::ContentBlockStop)
                    }
                    "message_delta" => decode::<SseMessageDelta>("message_delta", &event.data)
                        .map(StreamEvent::MessageDelta),
                    "message_stop" => Ok(StreamEvent::MessageStop),
                    "ping" => Ok(StreamEvent::Ping),
                    "error" => {
                        decode::<SseError>("error event", &event.data).map(StreamEvent::Error)
                    }
                    // Unknown event types are silently ignored per Anthropic versioning policy.
                    _ => return None,
                };
                Some(parsed)
            }
            Err(e) => Some(Err(StrandError::Upstream {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}
