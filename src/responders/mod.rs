//! Responder adapters — the swappable capability providers the router
//! tries in order.
//!
//! Each adapter is an independent failure domain: `Ok(None)` and `Err(_)`
//! both read as "this stage abstained" to the router, which logs and falls
//! through.

pub mod dialogue;
pub mod generative;
pub mod local;
pub mod retrieval;

use async_trait::async_trait;

use crate::error::StageError;

pub use dialogue::DialogueResponder;
pub use generative::GenerativeResponder;
pub use local::LocalResponder;
pub use retrieval::{DocumentIndex, InMemoryIndex, Passage, RetrievalResponder};

/// One candidate responder in the fallback chain.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Stage name for logging.
    fn name(&self) -> &str;

    /// Try to answer. `Ok(None)` means "no reply from this tier".
    async fn respond(&self, text: &str, user_id: &str) -> Result<Option<String>, StageError>;
}
