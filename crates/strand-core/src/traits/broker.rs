// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resumable-transport trait: a publish/subscribe broker keyed by stream id.
//!
//! Resumability is a best-effort enhancement. The broker is an injected
//! collaborator with an explicit "not configured" state rather than a
//! process-wide lazily-initialized singleton; when unavailable, the
//! pipeline degrades to non-resumable delivery and resumption requests
//! return empty responses.

use std::pin::Pin;

use async_trait::async_trait;

use crate::error::StrandError;
use crate::types::Frame;

/// Buffered replay followed by the live tail of a topic. Ends when the
/// publisher closes the topic.
pub type FrameStream = Pin<Box<dyn futures_core::Stream<Item = Frame> + Send>>;

/// Publish/subscribe transport for in-flight generation streams.
#[async_trait]
pub trait StreamBroker: Send + Sync {
    /// Whether a resumable transport is configured at all.
    fn is_available(&self) -> bool;

    /// Create the topic for a stream id. Called once per turn by the
    /// orchestrator before the first frame is published.
    async fn open(&self, stream_id: &str) -> Result<(), StrandError>;

    /// Publish one frame to the topic's buffer and any live subscribers.
    async fn publish(&self, stream_id: &str, frame: Frame) -> Result<(), StrandError>;

    /// Conclude the topic. Subscribers' tails end; later subscribes see
    /// `None` and fall back to storage.
    async fn close(&self, stream_id: &str) -> Result<(), StrandError>;

    /// Reattach to a stream. `None` means the topic concluded (or never
    /// existed here) with no residual buffered data.
    async fn subscribe(&self, stream_id: &str) -> Result<Option<FrameStream>, StrandError>;

    /// Release all topics. Called on shutdown.
    async fn teardown(&self) -> Result<(), StrandError>;
}
