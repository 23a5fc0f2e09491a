//! Conversation History
//!
//! Turns, roles, and the session store that keeps each session's transcript
//! in process memory.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Model => write!(f, "model"),
        }
    }
}

/// One message within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Storage for per-session turn sequences.
///
/// Implementations must make `append` atomic with respect to other appends on
/// the same session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the session's turns in chronological order. Unknown sessions
    /// have an empty history.
    async fn history(&self, session_id: &str) -> Result<Vec<Turn>, StoreError>;

    /// Appends a turn, creating the session on first reference, and returns
    /// the full history including the new turn.
    async fn append(&self, session_id: &str, turn: Turn) -> Result<Vec<Turn>, StoreError>;
}

/// A `SessionStore` held entirely in process memory. Sessions live until the
/// process exits.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions referenced so far.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn history(&self, session_id: &str) -> Result<Vec<Turn>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn append(&self, session_id: &str, turn: Turn) -> Result<Vec<Turn>, StoreError> {
        let mut sessions = self.sessions.write().await;
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(turn);
        Ok(turns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let store = InMemorySessionStore::new();
        let history = store.history("missing").await.unwrap();
        assert!(history.is_empty());
        // Reading does not create the session.
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemorySessionStore::new();
        store.append("abc", Turn::user("Hello")).await.unwrap();
        let history = store.append("abc", Turn::model("Hi there")).await.unwrap();

        assert_eq!(history, vec![Turn::user("Hello"), Turn::model("Hi there")]);
        assert_eq!(store.history("abc").await.unwrap(), history);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        store.append("a", Turn::user("one")).await.unwrap();
        store.append("b", Turn::user("two")).await.unwrap();

        assert_eq!(store.history("a").await.unwrap(), vec![Turn::user("one")]);
        assert_eq!(store.history("b").await.unwrap(), vec![Turn::user("two")]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append("shared", Turn::user(format!("msg {}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.history("shared").await.unwrap().len(), 50);
    }

    #[test]
    fn test_turn_serialization() {
        let json = serde_json::to_string(&Turn::model("ok")).unwrap();
        assert_eq!(json, r#"{"role":"model","text":"ok"}"#);
        assert_eq!(Role::User.to_string(), "user");
    }
}
