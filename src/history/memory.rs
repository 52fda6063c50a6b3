//! In-memory history store implementation.

use super::{HistoryStore, Turn};
use crate::error::{DocentError, Result};
use crate::session::SessionId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory history store, keyed by session.
pub struct MemoryHistoryStore {
    sessions: RwLock<HashMap<SessionId, Vec<Turn>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, turns: &[Turn]) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| DocentError::History(format!("Lock poisoned: {}", e)))?;

        for turn in turns {
            sessions.entry(turn.session_id).or_default().push(turn.clone());
        }
        Ok(())
    }

    async fn read(&self, session_id: &SessionId) -> Result<Vec<Turn>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| DocentError::History(format!("Lock poisoned: {}", e)))?;

        let mut turns = sessions.get(session_id).cloned().unwrap_or_default();
        // Stable sort keeps append order for equal timestamps
        turns.sort_by_key(|t| t.timestamp);
        Ok(turns)
    }
}
