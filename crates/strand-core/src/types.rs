// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Strand workspace.
//!
//! Rows (Chat, Message, StreamRow) carry RFC 3339 string timestamps with
//! millisecond precision so SQLite string comparison stays chronological.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Current time as an RFC 3339 UTC string with millisecond precision.
///
/// Matches SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`, so timestamps
/// generated on either side compare lexicographically.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Message author role. A closed set: unknown persisted values are a parse
/// error, never silently coerced (see DESIGN.md).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Chat visibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Lifecycle status of a generation stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    Inactive,
    Completed,
}

/// A persistent conversation thread owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub visibility: Visibility,
    pub project_id: Option<String>,
    pub created_at: String,
    pub last_activity_at: String,
}

/// One typed content segment of a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolInvocation {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        output: serde_json::Value,
    },
}

/// A file attached to a message. Storage of the file itself is external.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    pub media_type: String,
}

/// One immutable message row. Created once, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    /// Ordered typed content segments.
    pub parts: Vec<MessagePart>,
    /// Denormalized plain text for fast retrieval and title derivation.
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub created_at: String,
}

/// Derive plain text from an optional direct content string and typed parts.
///
/// Direct text content wins; otherwise text-typed parts are concatenated.
/// No text anywhere is an empty string, not an error.
pub fn derive_plain_text(content: Option<&str>, parts: &[MessagePart]) -> String {
    if let Some(text) = content
        && !text.is_empty()
    {
        return text.to_string();
    }
    parts
        .iter()
        .filter_map(|part| match part {
            MessagePart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

/// One generation attempt registered for a chat. The id outlives the HTTP
/// response that started it, which is what makes resumption possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRow {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    pub status: StreamStatus,
    pub created_at: String,
    pub expires_at: Option<String>,
}

/// Token accounting reported by the producer's terminal chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One unit of incrementally produced model output.
///
/// The sequence is lazy, finite and non-restartable; `Finish` is always the
/// last element and carries the fully assembled reply, so consumers can
/// persist with a plain fold instead of an on-finish callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducerChunk {
    TextDelta(String),
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    Finish {
        text: String,
        usage: TokenUsage,
    },
}

/// One message of prompt history handed to the token producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// A request to the token producer: model, prompt, history, optional tools.
#[derive(Debug, Clone)]
pub struct ProducerRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<HistoryMessage>,
    pub max_tokens: u32,
    pub tools: Option<Vec<serde_json::Value>>,
}

/// A wire frame delivered to clients over the chunked response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Frame {
    TextDelta { delta: String },
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    Finish { usage: TokenUsage },
    Error { message: String },
    /// Synthetic resumption frame carrying an already-completed message.
    AppendMessage { message: Message },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_storage_text() {
        for role in [Role::User, Role::Assistant, Role::System] {
            let parsed = Role::from_str(&role.to_string()).unwrap();
            assert_eq!(role, parsed);
        }
    }

    #[test]
    fn unknown_role_is_a_parse_error() {
        assert!(Role::from_str("moderator").is_err());
        assert!(Role::from_str("").is_err());
    }

    #[test]
    fn plain_text_prefers_direct_content() {
        let parts = vec![MessagePart::Text {
            text: "from parts".into(),
        }];
        assert_eq!(derive_plain_text(Some("direct"), &parts), "direct");
    }

    #[test]
    fn plain_text_falls_back_to_text_parts() {
        let parts = vec![
            MessagePart::Text { text: "hello ".into() },
            MessagePart::ToolInvocation {
                id: "t1".into(),
                name: "search".into(),
                input: serde_json::json!({}),
            },
            MessagePart::Text { text: "world".into() },
        ];
        assert_eq!(derive_plain_text(None, &parts), "hello world");
        assert_eq!(derive_plain_text(Some(""), &parts), "hello world");
    }

    #[test]
    fn plain_text_absent_everywhere_is_empty() {
        let parts = vec![MessagePart::ToolResult {
            tool_use_id: "t1".into(),
            output: serde_json::json!({"ok": true}),
        }];
        assert_eq!(derive_plain_text(None, &parts), "");
    }

    #[test]
    fn frame_serialization_is_tagged_kebab_case() {
        let frame = Frame::TextDelta { delta: "hi".into() };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""type":"text-delta""#), "got: {json}");

        let finish = Frame::Finish {
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 25,
            },
        };
        let json = serde_json::to_string(&finish).unwrap();
        assert!(json.contains(r#""type":"finish""#), "got: {json}");
        assert!(json.contains(r#""output_tokens":25"#));
    }

    #[test]
    fn message_part_round_trip() {
        let part = MessagePart::ToolInvocation {
            id: "toolu_1".into(),
            name: "bash".into(),
            input: serde_json::json!({"command": "ls"}),
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains(r#""type":"tool-invocation""#), "got: {json}");
        let back: MessagePart = serde_json::from_str(&json).unwrap();
        assert_eq!(part, back);
    }

    #[test]
    fn append_message_frames_compare_by_value() {
        let message = Message {
            id: "m1".into(),
            chat_id: "c1".into(),
            role: Role::Assistant,
            parts: vec![MessagePart::Text { text: "done".into() }],
            content: "done".into(),
            attachments: vec![],
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let frame = Frame::AppendMessage {
            message: message.clone(),
        };
        assert_eq!(frame, Frame::AppendMessage { message });
        assert_ne!(frame, Frame::Error { message: "x".into() });
    }

    #[test]
    fn now_rfc3339_matches_sqlite_format() {
        let now = now_rfc3339();
        // e.g. 2026-08-30T12:34:56.789Z
        assert!(now.ends_with('Z'), "got: {now}");
        assert_eq!(now.len(), 24, "got: {now}");
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
    }
}
