//! Session store — injected abstraction with an in-memory default.
//!
//! Concurrency contract: updates for different users never block each
//! other; updates for the same user are linearizable (per-user mutex), so
//! rapid double-submits cannot lose writes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use super::types::{SessionField, UserSession};

/// Backend-agnostic per-user session state.
///
/// Reads never fail: an unknown user resolves to a default session. The
/// router only ever calls `get_context`, `update_context`, and `add_fact`;
/// `clear_context` is reserved for administrative surfaces.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get a user's session, or an empty default if none exists.
    async fn get_context(&self, user_id: &str) -> UserSession;

    /// Set one session field and refresh `last_updated`.
    async fn update_context(&self, user_id: &str, field: SessionField, value: &str);

    /// Append a fact to the user's fact log unless already present.
    /// Idempotent under repeated identical input.
    async fn add_fact(&self, user_id: &str, fact: &str);

    /// The user's fact log, in insertion order.
    async fn facts(&self, user_id: &str) -> Vec<String>;

    /// Remove all state for a user. Administrative only.
    async fn clear_context(&self, user_id: &str);
}

#[derive(Debug, Default)]
struct UserState {
    session: UserSession,
    facts: Vec<String>,
}

/// In-memory store: a map `RwLock` for entry lookup plus one `Mutex` per
/// user for field-level linearizability.
#[derive(Default)]
pub struct InMemorySessionStore {
    users: RwLock<HashMap<String, Arc<Mutex<UserState>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, user_id: &str) -> Arc<Mutex<UserState>> {
        if let Some(entry) = self.users.read().await.get(user_id) {
            return Arc::clone(entry);
        }
        let mut users = self.users.write().await;
        Arc::clone(
            users
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(UserState::default()))),
        )
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_context(&self, user_id: &str) -> UserSession {
        match self.users.read().await.get(user_id) {
            Some(entry) => entry.lock().await.session.clone(),
            None => UserSession::default(),
        }
    }

    async fn update_context(&self, user_id: &str, field: SessionField, value: &str) {
        let entry = self.entry(user_id).await;
        let mut state = entry.lock().await;
        match field {
            SessionField::LastIntent => state.session.last_intent = Some(value.to_string()),
            SessionField::LastTone => state.session.last_tone = Some(value.to_string()),
        }
        state.session.last_updated = Some(Utc::now());
    }

    async fn add_fact(&self, user_id: &str, fact: &str) {
        let entry = self.entry(user_id).await;
        let mut state = entry.lock().await;
        if !state.facts.iter().any(|f| f == fact) {
            state.facts.push(fact.to_string());
        }
    }

    async fn facts(&self, user_id: &str) -> Vec<String> {
        match self.users.read().await.get(user_id) {
            Some(entry) => entry.lock().await.facts.clone(),
            None => Vec::new(),
        }
    }

    async fn clear_context(&self, user_id: &str) {
        self.users.write().await.remove(user_id);
    }
}
