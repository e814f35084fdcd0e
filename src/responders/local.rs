//! Local rule-based responder — the guaranteed terminal stage.
//!
//! Never abstains. Uses the intent and tone the router already computed:
//! fixed replies for the conversational intents, intent-database responses
//! where available, and a generic acknowledgement otherwise.

use rand::seq::SliceRandom;
use tracing::debug;

use crate::nlu::IntentDb;

pub struct LocalResponder {
    db: IntentDb,
}

impl LocalResponder {
    pub fn new(db: IntentDb) -> Self {
        Self { db }
    }

    /// Produce a reply. Always returns non-empty text.
    pub fn reply(&self, _text: &str, intent: &str, tone: &str, user_id: &str) -> String {
        debug!(user = %user_id, intent, tone, "Local responder answering");

        match intent {
            "greeting" => "Hello! How can I assist you today?".to_string(),
            "help_request" => {
                "Sure, I'm here to help. Please explain what you need.".to_string()
            }
            "farewell" => "Goodbye! Feel free to reach out anytime.".to_string(),
            "emotion" => format!("I sense you're feeling {tone}. Want to talk about it?"),
            _ => {
                let responses = self.db.responses_for(intent);
                responses
                    .choose(&mut rand::thread_rng())
                    .cloned()
                    .unwrap_or_else(|| {
                        "I'm processing your message. Let me think...".to_string()
                    })
            }
        }
    }
}
