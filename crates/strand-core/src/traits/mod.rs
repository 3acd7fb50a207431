// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the seams of the streaming pipeline.
//!
//! Both collaborators are injected into the gateway as trait objects and
//! use `#[async_trait]` for dynamic dispatch compatibility.

pub mod broker;
pub mod producer;

pub use broker::{FrameStream, StreamBroker};
pub use producer::{ChunkStream, TokenProducer};
