//! Per-user session state, fact memory, and the fallback audit trail.

mod audit;
mod store;
mod types;

pub use audit::{AuditSink, InMemoryAuditSink};
pub use store::{InMemorySessionStore, SessionStore};
pub use types::{FallbackEvent, FallbackSource, SessionField, UserSession};
