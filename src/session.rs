//! Session identifiers.
//!
//! A session is a conversation thread keyed by a canonical UUID
//! (`8-4-4-4-12` hex groups). Identifiers in any other shape, including
//! the braced, URN and hyphen-less forms `uuid` would otherwise accept,
//! are treated as absent.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Canonical UUID session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh random session identifier.
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a canonical hyphenated UUID. Returns `None` for any other shape.
    pub fn parse(value: &str) -> Option<Self> {
        if !is_canonical(value) {
            return None;
        }
        Uuid::parse_str(value).ok().map(Self)
    }

    /// Use the supplied identifier if it is canonical, otherwise mint a new one.
    pub fn resolve(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_else(Self::mint)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

fn is_canonical(value: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    let parts: Vec<&str> = value.split('-').collect();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}
