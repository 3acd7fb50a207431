// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message CRUD operations and the entitlement-gate count.
//!
//! Messages are append-only. The message id is the natural idempotency key:
//! inserts use `INSERT OR IGNORE`, so writing the same id twice never
//! creates a duplicate row.

use std::str::FromStr;

use rusqlite::params;
use strand_core::{Message, Role, StrandError};
use tracing::warn;

use crate::database::{map_tr_err, Database};

/// Raw message row before role/JSON decoding.
struct RawMessage {
    id: String,
    chat_id: String,
    role: String,
    parts: String,
    content: String,
    attachments: String,
    created_at: String,
}

fn read_raw(row: &rusqlite::Row<'_>) -> Result<RawMessage, rusqlite::Error> {
    Ok(RawMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: row.get(2)?,
        parts: row.get(3)?,
        content: row.get(4)?,
        attachments: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Decode a raw row, quarantining rows that fail role or JSON decoding.
///
/// An unrecognized role is not coerced to `user`: the row is skipped with a
/// warning so one bad row cannot silently change authorship or kill the
/// whole chat (see DESIGN.md).
fn decode_message(raw: RawMessage) -> Option<Message> {
    let role = match Role::from_str(&raw.role) {
        Ok(role) => role,
        Err(_) => {
            warn!(
                message_id = %raw.id,
                role = %raw.role,
                "quarantining message with unrecognized role"
            );
            return None;
        }
    };
    let parts = match serde_json::from_str(&raw.parts) {
        Ok(parts) => parts,
        Err(e) => {
            warn!(message_id = %raw.id, error = %e, "quarantining message with undecodable parts");
            return None;
        }
    };
    let attachments = serde_json::from_str(&raw.attachments).unwrap_or_default();
    Some(Message {
        id: raw.id,
        chat_id: raw.chat_id,
        role,
        parts,
        content: raw.content,
        attachments,
        created_at: raw.created_at,
    })
}

/// Insert a message. Returns true when the row was actually inserted,
/// false when the id already existed (idempotent retry).
pub async fn insert_message(db: &Database, msg: &Message) -> Result<bool, StrandError> {
    let msg = msg.clone();
    let parts = serde_json::to_string(&msg.parts).map_err(|e| StrandError::Storage {
        source: Box::new(e),
    })?;
    let attachments =
        serde_json::to_string(&msg.attachments).map_err(|e| StrandError::Storage {
            source: Box::new(e),
        })?;
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO messages (id, chat_id, role, parts, content, attachments, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    msg.id,
                    msg.chat_id,
                    msg.role.to_string(),
                    parts,
                    msg.content,
                    attachments,
                    msg.created_at,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Get messages for a chat in chronological order.
pub async fn list_messages(
    db: &Database,
    chat_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, StrandError> {
    let chat_id = chat_id.to_string();
    let raw_rows = db
        .connection()
        .call(move |conn| -> Result<Vec<RawMessage>, rusqlite::Error> {
            let mut rows = Vec::new();
            match limit {
                Some(lim) => {
                    // Newest `lim` rows, re-sorted oldest first. rowid breaks
                    // ties between rows written in the same millisecond.
                    let mut stmt = conn.prepare(
                        "SELECT id, chat_id, role, parts, content, attachments, created_at
                         FROM (SELECT rowid AS rid, * FROM messages WHERE chat_id = ?1
                               ORDER BY created_at DESC, rowid DESC LIMIT ?2)
                         ORDER BY created_at ASC, rid ASC",
                    )?;
                    let mapped = stmt.query_map(params![chat_id, lim], read_raw)?;
                    for row in mapped {
                        rows.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, chat_id, role, parts, content, attachments, created_at
                         FROM messages WHERE chat_id = ?1
                         ORDER BY created_at ASC, rowid ASC",
                    )?;
                    let mapped = stmt.query_map(params![chat_id], read_raw)?;
                    for row in mapped {
                        rows.push(row?);
                    }
                }
            }
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    Ok(raw_rows.into_iter().filter_map(decode_message).collect())
}

/// Get the most recently created message of a chat, if any.
pub async fn latest_message(
    db: &Database,
    chat_id: &str,
) -> Result<Option<Message>, StrandError> {
    let chat_id = chat_id.to_string();
    let raw = db
        .connection()
        .call(move |conn| -> Result<Option<RawMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, role, parts, content, attachments, created_at
                 FROM messages WHERE chat_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
            )?;
            let result = stmt.query_row(params![chat_id], read_raw);
            match result {
                Ok(raw) => Ok(Some(raw)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    Ok(raw.and_then(decode_message))
}

/// Count user-role messages authored by `user_id` within the trailing
/// window. Pure read with no side effects; the entitlement gate compares
/// this against the caller tier's daily limit.
pub async fn count_recent_user_messages(
    db: &Database,
    user_id: &str,
    window_hours: u32,
) -> Result<u32, StrandError> {
    let user_id = user_id.to_string();
    let window = format!("-{window_hours} hours");
    db.connection()
        .call(move |conn| -> Result<u32, rusqlite::Error> {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 JOIN chats c ON m.chat_id = c.id
                 WHERE c.user_id = ?1
                   AND m.role = 'user'
                   AND m.created_at >= strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?2)",
                params![user_id, window],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::chats::create_chat;
    use strand_core::{now_rfc3339, Chat, MessagePart, Visibility};
    use tempfile::tempdir;

    async fn setup_db_with_chat(user: &str) -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let chat = Chat {
            id: "chat-1".to_string(),
            user_id: user.to_string(),
            title: "test".to_string(),
            visibility: Visibility::Private,
            project_id: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            last_activity_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        create_chat(&db, &chat).await.unwrap();
        (db, dir)
    }

    fn make_msg(id: &str, role: Role, content: &str, timestamp: &str) -> Message {
        Message {
            id: id.to_string(),
            chat_id: "chat-1".to_string(),
            role,
            parts: vec![MessagePart::Text {
                text: content.to_string(),
            }],
            content: content.to_string(),
            attachments: vec![],
            created_at: timestamp.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_and_list_in_order() {
        let (db, _dir) = setup_db_with_chat("alice").await;

        let m1 = make_msg("m1", Role::User, "hello", "2026-01-01T00:00:01.000Z");
        let m2 = make_msg("m2", Role::Assistant, "hi there", "2026-01-01T00:00:02.000Z");

        assert!(insert_message(&db, &m1).await.unwrap());
        assert!(insert_message(&db, &m2).await.unwrap());

        let messages = list_messages(&db, "chat-1", None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(
            messages[0].parts,
            vec![MessagePart::Text { text: "hello".into() }]
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_message_id_is_a_noop() {
        let (db, _dir) = setup_db_with_chat("alice").await;

        let msg = make_msg("m-dup", Role::User, "first", "2026-01-01T00:00:01.000Z");
        assert!(insert_message(&db, &msg).await.unwrap());

        let mut retry = msg.clone();
        retry.content = "second attempt".to_string();
        assert!(!insert_message(&db, &retry).await.unwrap());

        let messages = list_messages(&db, "chat-1", None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "first");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_with_limit_keeps_newest_in_chronological_order() {
        let (db, _dir) = setup_db_with_chat("alice").await;

        for i in 0..5 {
            let msg = make_msg(
                &format!("m{i}"),
                Role::User,
                &format!("msg {i}"),
                &format!("2026-01-01T00:00:0{i}.000Z"),
            );
            insert_message(&db, &msg).await.unwrap();
        }

        let messages = list_messages(&db, "chat-1", Some(3)).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].id, "m2");
        assert_eq!(messages[2].id, "m4");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn latest_message_returns_newest() {
        let (db, _dir) = setup_db_with_chat("alice").await;
        assert!(latest_message(&db, "chat-1").await.unwrap().is_none());

        let m1 = make_msg("m1", Role::User, "q", "2026-01-01T00:00:01.000Z");
        let m2 = make_msg("m2", Role::Assistant, "a", "2026-01-01T00:00:02.000Z");
        insert_message(&db, &m1).await.unwrap();
        insert_message(&db, &m2).await.unwrap();

        let latest = latest_message(&db, "chat-1").await.unwrap().unwrap();
        assert_eq!(latest.id, "m2");
        assert_eq!(latest.role, Role::Assistant);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_role_rows_are_quarantined_not_coerced() {
        let (db, _dir) = setup_db_with_chat("alice").await;

        let good = make_msg("m-good", Role::User, "fine", "2026-01-01T00:00:01.000Z");
        insert_message(&db, &good).await.unwrap();

        // Write a bad role directly, bypassing the typed API.
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO messages (id, chat_id, role, parts, content, attachments, created_at)
                     VALUES ('m-bad', 'chat-1', 'moderator', '[]', 'x', '[]', '2026-01-01T00:00:02.000Z')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let messages = list_messages(&db, "chat-1", None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m-good");

        // latest_message sees the quarantined row as absent too.
        assert!(latest_message(&db, "chat-1").await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn quota_count_filters_owner_role_and_window() {
        let (db, _dir) = setup_db_with_chat("alice").await;

        // Two fresh user messages, one assistant reply, one ancient message.
        let now = now_rfc3339();
        for (id, role, ts) in [
            ("q1", Role::User, now.clone()),
            ("q2", Role::User, now.clone()),
            ("a1", Role::Assistant, now.clone()),
            ("old", Role::User, "2020-01-01T00:00:00.000Z".to_string()),
        ] {
            let msg = make_msg(id, role, "x", &ts);
            insert_message(&db, &msg).await.unwrap();
        }

        assert_eq!(
            count_recent_user_messages(&db, "alice", 24).await.unwrap(),
            2
        );
        // A different owner sees none of them.
        assert_eq!(
            count_recent_user_messages(&db, "bob", 24).await.unwrap(),
            0
        );

        db.close().await.unwrap();
    }
}
