// SPDX-FileCopyrightText: 2026 Strand Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream registry persistence.
//!
//! A stream row decouples stream identity from HTTP response lifetime: the
//! id survives a client disconnect even though the response socket does not,
//! which is what makes resumption lookups possible.

use rusqlite::params;
use strand_core::{StrandError, StreamRow, StreamStatus};
use tracing::warn;

use crate::database::{map_tr_err, Database};

/// Insert a stream registry row. Called once per turn, before token
/// production begins.
pub async fn create_stream(db: &Database, stream: &StreamRow) -> Result<(), StrandError> {
    let stream = stream.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO streams (id, chat_id, user_id, status, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    stream.id,
                    stream.chat_id,
                    stream.user_id,
                    stream.status.to_string(),
                    stream.created_at,
                    stream.expires_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Stream ids for a chat, oldest first, excluding expired rows.
///
/// The resumption handler takes the last element as the most recent attempt.
pub async fn list_stream_ids_by_chat(
    db: &Database,
    chat_id: &str,
) -> Result<Vec<String>, StrandError> {
    let chat_id = chat_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id FROM streams
                 WHERE chat_id = ?1
                   AND (expires_at IS NULL
                        OR expires_at > strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let mapped = stmt.query_map(params![chat_id], |row| row.get(0))?;
            let mut ids = Vec::new();
            for id in mapped {
                ids.push(id?);
            }
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Transition a stream's status.
pub async fn update_stream_status(
    db: &Database,
    id: &str,
    status: StreamStatus,
) -> Result<(), StrandError> {
    let id = id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE streams SET status = ?1 WHERE id = ?2",
                params![status, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Best-effort completion marker. A failure to update status must not abort
/// an in-progress response, so errors are logged and swallowed here.
pub async fn mark_stream_completed(db: &Database, id: &str) {
    if let Err(e) = update_stream_status(db, id, StreamStatus::Completed).await {
        warn!(stream_id = %id, error = %e, "failed to mark stream completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::chats::create_chat;
    use strand_core::{Chat, Visibility};
    use tempfile::tempdir;

    async fn setup_db_with_chat() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        let chat = Chat {
            id: "chat-1".to_string(),
            user_id: "alice".to_string(),
            title: "test".to_string(),
            visibility: Visibility::Private,
            project_id: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            last_activity_at: "2026-01-01T00:00:00.000Z".to_string(),
        };
        create_chat(&db, &chat).await.unwrap();
        (db, dir)
    }

    fn make_stream(id: &str, timestamp: &str) -> StreamRow {
        StreamRow {
            id: id.to_string(),
            chat_id: "chat-1".to_string(),
            user_id: "alice".to_string(),
            status: StreamStatus::Active,
            created_at: timestamp.to_string(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn streams_list_oldest_first() {
        let (db, _dir) = setup_db_with_chat().await;

        for (id, ts) in [
            ("s2", "2026-01-01T00:00:02.000Z"),
            ("s1", "2026-01-01T00:00:01.000Z"),
            ("s3", "2026-01-01T00:00:03.000Z"),
        ] {
            create_stream(&db, &make_stream(id, ts)).await.unwrap();
        }

        let ids = list_stream_ids_by_chat(&db, "chat-1").await.unwrap();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_streams_are_excluded() {
        let (db, _dir) = setup_db_with_chat().await;

        let mut expired = make_stream("s-old", "2026-01-01T00:00:01.000Z");
        expired.expires_at = Some("2026-01-02T00:00:00.000Z".to_string());
        create_stream(&db, &expired).await.unwrap();

        let mut live = make_stream("s-live", "2026-01-01T00:00:02.000Z");
        live.expires_at = Some("2999-01-01T00:00:00.000Z".to_string());
        create_stream(&db, &live).await.unwrap();

        let ids = list_stream_ids_by_chat(&db, "chat-1").await.unwrap();
        assert_eq!(ids, vec!["s-live"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_transitions_persist() {
        let (db, _dir) = setup_db_with_chat().await;
        create_stream(&db, &make_stream("s1", "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();

        update_stream_status(&db, "s1", StreamStatus::Completed)
            .await
            .unwrap();

        let status: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                let s = conn.query_row(
                    "SELECT status FROM streams WHERE id = 's1'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(s)
            })
            .await
            .unwrap();
        assert_eq!(status, "completed");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_completed_swallows_missing_rows() {
        let (db, _dir) = setup_db_with_chat().await;
        // No such stream: must not panic or error.
        mark_stream_completed(&db, "no-such-stream").await;
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn empty_chat_has_no_streams() {
        let (db, _dir) = setup_db_with_chat().await;
        let ids = list_stream_ids_by_chat(&db, "chat-1").await.unwrap();
        assert!(ids.is_empty());
        db.close().await.unwrap();
    }
}
