//! Conversation history storage.
//!
//! Each session is an append-only stream of [`Turn`]s, replayed in
//! timestamp order. Concurrent requests for the same session are not
//! serialized; their turns may interleave.

mod memory;
mod sqlite;

pub use memory::MemoryHistoryStore;
pub use sqlite::SqliteHistoryStore;

use crate::error::Result;
use crate::session::SessionId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Speaker of a persisted turn. System prompts are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role-tagged message without session bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One persisted message of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: SessionId,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(session_id: SessionId, user_id: &str, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_id,
            user_id: user_id.to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}

/// Trait for history store implementations.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append turns, keeping their order for equal timestamps.
    async fn append(&self, turns: &[Turn]) -> Result<()>;

    /// All turns of a session, oldest first.
    async fn read(&self, session_id: &SessionId) -> Result<Vec<Turn>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_accepts_exactly_two_roles() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("system".parse::<Role>().is_err());
        assert!("User".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde() {
        let message: Message = serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert!(serde_json::from_str::<Message>(r#"{"role":"bot","content":"hi"}"#).is_err());
    }
}
