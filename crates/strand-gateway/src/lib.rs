// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Strand chat service.
//!
//! Routes:
//! - `POST /chat` -- one streaming turn (validate, quota, persist, produce)
//! - `GET /chat?chatId=` -- resume the most recent generation
//! - `DELETE /chat?id=` -- remove an owned chat
//! - `GET /health` -- unauthenticated liveness
//!
//! All `/chat` routes require bearer auth resolved against the config
//! session registry.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod resume;
pub mod server;

pub use server::{build_router, start_server, AppState, ServerConfig};
