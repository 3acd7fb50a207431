// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude token producer for strand.
//!
//! This crate implements [`TokenProducer`] against the Anthropic Messages
//! API, translating its streaming SSE protocol into the flat chunk sequence
//! the orchestrator consumes.

pub mod client;
pub mod sse;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::StreamExt;
use strand_config::AnthropicConfig;
use strand_core::traits::{ChunkStream, TokenProducer};
use strand_core::{ProducerChunk, ProducerRequest, StrandError, TokenUsage};
use tracing::{debug, info, warn};

use crate::client::AnthropicClient;
use crate::sse::StreamEvent;
use crate::types::{ApiMessage, MessageRequest, ResponseContentBlock, SseDelta, ToolDefinition};

/// Anthropic Claude producer implementing [`TokenProducer`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> error.
pub struct AnthropicProducer {
    client: AnthropicClient,
    max_tokens: u32,
}

impl AnthropicProducer {
    /// Creates a new producer from the given configuration.
    pub fn new(config: &AnthropicConfig) -> Result<Self, StrandError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = AnthropicClient::new(
            api_key,
            config.api_version.clone(),
            config.default_model.clone(),
        )?;

        info!(model = %config.default_model, "Anthropic producer initialized");

        Ok(Self {
            client,
            max_tokens: config.max_tokens,
        })
    }

    /// Creates a producer with an existing client (for testing).
    pub fn with_client(client: AnthropicClient, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    /// Returns the default model identifier.
    pub fn default_model(&self) -> &str {
        self.client.default_model()
    }

    /// Converts a [`ProducerRequest`] to an Anthropic [`MessageRequest`].
    fn to_message_request(&self, request: &ProducerRequest) -> MessageRequest {
        let messages: Vec<ApiMessage> = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect();

        let max_tokens = if request.max_tokens > 0 {
            request.max_tokens
        } else {
            self.max_tokens
        };

        // Convert tool definitions from serde_json::Value to ToolDefinition
        // structs; malformed entries are dropped with a warning.
        let tools = request
            .tools
            .as_ref()
            .map(|tool_values| {
                tool_values
                    .iter()
                    .filter_map(|v| match serde_json::from_value::<ToolDefinition>(v.clone()) {
                        Ok(def) => Some(def),
                        Err(e) => {
                            warn!(error = %e, "skipping malformed tool definition");
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .and_then(|v| if v.is_empty() { None } else { Some(v) });

        MessageRequest {
            model: request.model.clone(),
            messages,
            system: request.system_prompt.clone(),
            max_tokens,
            stream: true,
            tools,
        }
    }
}

#[async_trait]
impl TokenProducer for AnthropicProducer {
    async fn produce(&self, request: ProducerRequest) -> Result<ChunkStream, StrandError> {
        let api_request = self.to_message_request(&request);
        debug!(
            model = %api_request.model,
            history_len = api_request.messages.len(),
            "starting token production"
        );
        let event_stream = self.client.stream_message(&api_request).await?;

        // Stateful fold over the SSE events. Text deltas pass through and
        // are also accumulated so Finish can carry the assembled reply.
        // Tool input JSON arrives as partial deltas keyed by block index and
        // is parsed on block stop.
        let mut state = FoldState::default();

        let chunk_stream = event_stream.filter_map(move |result| {
            let chunk = match result {
                Ok(event) => map_stream_event(event, &mut state),
                Err(e) => Some(Err(e)),
            };
            async move { chunk }
        });

        Ok(Box::pin(chunk_stream))
    }
}

#[derive(Default)]
struct FoldState {
    /// Full text assembled so far, for the Finish chunk.
    text: String,
    /// Active tool_use blocks: index -> (id, name, accumulated JSON).
    tool_blocks: HashMap<usize, (String, String, String)>,
    usage: TokenUsage,
}

fn map_stream_event(
    event: StreamEvent,
    state: &mut FoldState,
) -> Option<Result<ProducerChunk, StrandError>> {
    match event {
        StreamEvent::MessageStart(ms) => {
            state.usage.input_tokens = ms.message.usage.input_tokens;
            None
        }
        StreamEvent::ContentBlockStart(cbs) => {
            if let ResponseContentBlock::ToolUse { id, name, .. } = &cbs.content_block {
                state
                    .tool_blocks
                    .insert(cbs.index, (id.clone(), name.clone(), String::new()));
            }
            None
        }
        StreamEvent::ContentBlockDelta(delta) => match delta.delta {
            SseDelta::TextDelta { text } => {
                state.text.push_str(&text);
                Some(Ok(ProducerChunk::TextDelta(text)))
            }
            SseDelta::InputJsonDelta { partial_json } => {
                if let Some((_, _, json)) = state.tool_blocks.get_mut(&delta.index) {
                    json.push_str(&partial_json);
                }
                None
            }
        },
        StreamEvent::ContentBlockStop(cbs) => {
            let (id, name, json_str) = state.tool_blocks.remove(&cbs.index)?;
            let input = if json_str.is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                match serde_json::from_str(&json_str) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, json = %json_str, "failed to parse tool input JSON");
                        serde_json::json!({"_parse_error": e.to_string(), "_raw": json_str})
                    }
                }
            };
            Some(Ok(ProducerChunk::ToolCall { id, name, input }))
        }
        StreamEvent::MessageDelta(md) => {
            if let Some(usage) = md.usage {
                state.usage.output_tokens = usage.output_tokens;
                if usage.input_tokens > 0 {
                    state.usage.input_tokens = usage.input_tokens;
                }
            }
            None
        }
        StreamEvent::MessageStop => Some(Ok(ProducerChunk::Finish {
            text: std::mem::take(&mut state.text),
            usage: state.usage,
        })),
        StreamEvent::Error(err) => Some(Err(StrandError::Upstream {
            message: format!("{}: {}", err.error.type_, err.error.message),
            source: None,
        })),
        // Keep-alive, no user-facing output.
        StreamEvent::Ping => None,
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, StrandError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        StrandError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )
    })
}
