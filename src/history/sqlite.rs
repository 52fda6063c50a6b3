//! SQLite-based history store implementation.

use super::{HistoryStore, Role, Turn};
use crate::error::{DocentError, Result};
use crate::session::SessionId;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_history_session ON chat_history(session_id, timestamp);
"#;

/// SQLite-based history store.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open (or create) a history store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite history store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory history store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DocentError::History(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    #[instrument(skip(self, turns), fields(count = turns.len()))]
    async fn append(&self, turns: &[Turn]) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for turn in turns {
            tx.execute(
                r#"
                INSERT INTO chat_history (session_id, user_id, role, content, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    turn.session_id.to_string(),
                    turn.user_id,
                    turn.role.as_str(),
                    turn.content,
                    turn.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                ],
            )?;
        }

        tx.commit()?;
        debug!("Appended {} turns", turns.len());
        Ok(())
    }

    #[instrument(skip(self), fields(session = %session_id))]
    async fn read(&self, session_id: &SessionId) -> Result<Vec<Turn>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, role, content, timestamp
            FROM chat_history
            WHERE session_id = ?1
            ORDER BY timestamp ASC, id ASC
            "#,
        )?;

        let rows = stmt.query_map(params![session_id.to_string()], |row| {
            let role: String = row.get(1)?;
            let timestamp: String = row.get(3)?;
            Ok((row.get::<_, String>(0)?, role, row.get::<_, String>(2)?, timestamp))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (user_id, role, content, timestamp) = row?;
            let Ok(role) = role.parse::<Role>() else {
                warn!("Skipping history row with unknown role {:?}", role);
                continue;
            };
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DocentError::History(format!("Bad timestamp {:?}: {}", timestamp, e)))?;

            turns.push(Turn {
                session_id: *session_id,
                user_id,
                role,
                content,
                timestamp,
            });
        }

        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_then_read_preserves_order() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let session = SessionId::mint();

        let user = Turn::new(session, "u1", Role::User, "What is autism?");
        let mut reply = Turn::new(session, "u1", Role::Assistant, "A developmental condition.");
        // Same instant: insertion order decides
        reply.timestamp = user.timestamp;

        store.append(&[user, reply]).await.unwrap();
        store
            .append(&[Turn::new(session, "u1", Role::User, "And its signs?")])
            .await
            .unwrap();

        let turns = store.read(&session).await.unwrap();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["What is autism?", "A developmental condition.", "And its signs?"]
        );
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        assert!(store.read(&SessionId::mint()).await.unwrap().is_empty());
    }
}
