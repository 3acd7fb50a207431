// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat CRUD operations.

use std::str::FromStr;

use rusqlite::params;
use strand_core::{now_rfc3339, Chat, StrandError, Visibility};

use crate::database::{map_tr_err, Database};

/// Create a chat if no row with this id exists yet.
///
/// The insert uses `ON CONFLICT(id) DO NOTHING` so a concurrent duplicate
/// turn racing on the same chat id succeeds instead of failing the turn.
/// Returns true when this call inserted the row.
pub async fn create_chat(db: &Database, chat: &Chat) -> Result<bool, StrandError> {
    let chat = chat.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "INSERT INTO chats (id, user_id, title, visibility, project_id, created_at, last_activity_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    chat.id,
                    chat.user_id,
                    chat.title,
                    chat.visibility.to_string(),
                    chat.project_id,
                    chat.created_at,
                    chat.last_activity_at,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a chat by id.
pub async fn get_chat(db: &Database, id: &str) -> Result<Option<Chat>, StrandError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Chat>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, visibility, project_id, created_at, last_activity_at
                 FROM chats WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], |row| {
                let visibility: String = row.get(3)?;
                Ok(Chat {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    title: row.get(2)?,
                    visibility: Visibility::from_str(&visibility).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            3,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    project_id: row.get(4)?,
                    created_at: row.get(5)?,
                    last_activity_at: row.get(6)?,
                })
            });
            match result {
                Ok(chat) => Ok(Some(chat)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a chat. Messages and streams cascade. Returns true when a row
/// was actually removed.
pub async fn delete_chat(db: &Database, id: &str) -> Result<bool, StrandError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute("DELETE FROM chats WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Bump a chat's last-activity timestamp to now.
///
/// The only chat mutation the streaming pipeline performs.
pub async fn touch_last_activity(db: &Database, id: &str) -> Result<(), StrandError> {
    let id = id.to_string();
    let now = now_rfc3339();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE chats SET last_activity_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
