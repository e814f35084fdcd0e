//! Fallback-source audit sink.
//!
//! Fire-and-forget: recording must never affect the routed reply, so the
//! trait is infallible and implementations swallow their own errors.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::types::{FallbackEvent, FallbackSource};

/// Records which stage answered each routed message.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, user_id: &str, source: FallbackSource);
}

/// In-memory sink: keeps the full event log plus the last source per user
/// (the value the admin surface reads).
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: RwLock<Vec<FallbackEvent>>,
    last_source: RwLock<HashMap<String, FallbackSource>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub async fn events(&self) -> Vec<FallbackEvent> {
        self.events.read().await.clone()
    }

    /// The source that answered the user's most recent message.
    pub async fn last_source(&self, user_id: &str) -> Option<FallbackSource> {
        self.last_source.read().await.get(user_id).copied()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, user_id: &str, source: FallbackSource) {
        info!(user = %user_id, source = %source, "Reply handled");
        self.events
            .write()
            .await
            .push(FallbackEvent::new(user_id, source));
        self.last_source
            .write()
            .await
            .insert(user_id.to_string(), source);
    }
}
