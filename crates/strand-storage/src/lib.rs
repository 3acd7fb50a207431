// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for strand.
//!
//! A single [`Database`] wraps a [`tokio_rusqlite`] connection; all reads and
//! writes go through the query modules so SQL stays in one place. The
//! connection is a single writer, which SQLite serializes for us -- callers
//! never need their own locking.

pub mod database;
mod migrations;
pub mod queries;

pub use database::Database;
