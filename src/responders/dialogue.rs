//! Structured-dialogue engine adapter (Rasa-style REST webhook).
//!
//! Sends `{sender, message}` and expects a JSON array of messages whose
//! first element carries a `text` field. Transport errors, non-2xx
//! statuses, and empty payloads all read as abstention.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Responder;
use crate::config::DialogueConfig;
use crate::error::StageError;

#[derive(Debug, Serialize)]
struct DialogueRequest<'a> {
    sender: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct DialogueMessage {
    #[serde(default)]
    text: Option<String>,
}

pub struct DialogueResponder {
    client: reqwest::Client,
    endpoint: String,
}

impl DialogueResponder {
    pub fn new(config: &DialogueConfig) -> Result<Self, StageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StageError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/webhooks/rest/webhook",
                config.base_url.trim_end_matches('/')
            ),
        })
    }

    fn first_text(payload: &[DialogueMessage]) -> Option<String> {
        payload
            .first()
            .and_then(|m| m.text.clone())
            .filter(|t| !t.trim().is_empty())
    }
}

#[async_trait]
impl Responder for DialogueResponder {
    fn name(&self) -> &str {
        "dialogue"
    }

    async fn respond(&self, text: &str, user_id: &str) -> Result<Option<String>, StageError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&DialogueRequest {
                sender: user_id,
                message: text,
            })
            .send()
            .await
            .map_err(|e| StageError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::BadStatus {
                status: status.as_u16(),
            });
        }

        let payload: Vec<DialogueMessage> = response
            .json()
            .await
            .map_err(|e| StageError::InvalidPayload(e.to_string()))?;

        Ok(Self::first_text(&payload))
    }
}
