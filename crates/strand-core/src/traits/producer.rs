// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token producer trait: the uniform "lazy sequence of output chunks"
//! interface over whatever model provider is configured.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::StrandError;
use crate::types::{ProducerChunk, ProducerRequest};

/// A lazy, finite, non-restartable sequence of producer output.
///
/// The last successful element is always [`ProducerChunk::Finish`].
/// Dropping the stream cancels upstream generation promptly.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<ProducerChunk, StrandError>> + Send>>;

/// Adapter over a token-generating model service.
#[async_trait]
pub trait TokenProducer: Send + Sync {
    /// Begin generating a reply for the given request.
    ///
    /// Errors from the underlying model surface as [`StrandError::Upstream`],
    /// either here (request rejected) or as a stream element (mid-generation).
    async fn produce(&self, request: ProducerRequest) -> Result<ChunkStream, StrandError>;
}
