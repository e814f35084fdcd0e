//! Session and audit data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mutable per-user conversational context.
///
/// Created lazily on first access; every field is last-write-wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSession {
    /// Most recent classified intent.
    pub last_intent: Option<String>,
    /// Most recent classified tone.
    pub last_tone: Option<String>,
    /// When any field was last written.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Which session field an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    LastIntent,
    LastTone,
}

/// Which stage produced the final reply for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackSource {
    Plugin,
    DialogueEngine,
    Retrieval,
    Generative,
    Local,
}

impl FallbackSource {
    /// Stable label used in logs and the audit trail.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Plugin => "PLUGIN",
            Self::DialogueEngine => "DIALOGUE_ENGINE",
            Self::Retrieval => "RETRIEVAL",
            Self::Generative => "GENERATIVE",
            Self::Local => "LOCAL",
        }
    }
}

impl std::fmt::Display for FallbackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Write-only audit record: one per successfully routed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackEvent {
    pub id: Uuid,
    pub user_id: String,
    pub source: FallbackSource,
    pub timestamp: DateTime<Utc>,
}

impl FallbackEvent {
    pub fn new(user_id: impl Into<String>, source: FallbackSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            source,
            timestamp: Utc::now(),
        }
    }
}
