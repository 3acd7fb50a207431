// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Strand chat service.
//!
//! This crate provides the foundational trait definitions, error types, and
//! domain types used throughout the Strand workspace: the message/chat/stream
//! data model, the producer chunk and wire frame vocabulary, and the traits
//! the gateway's collaborators implement.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ErrorCategory, ErrorSurface, StrandError};
pub use traits::{ChunkStream, FrameStream, StreamBroker, TokenProducer};
pub use types::{
    derive_plain_text, now_rfc3339, Attachment, Chat, Frame, HistoryMessage, Message,
    MessagePart, ProducerChunk, ProducerRequest, Role, StreamRow, StreamStatus,
    TokenUsage, Visibility,
};
