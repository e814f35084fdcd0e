//! Generative-model fallback adapter.
//!
//! Single-shot completion against an Ollama-style endpoint: posts
//! `{model, prompt, stream: false}` and reads the `response` field. Any
//! failure or empty completion reads as abstention — this tier sits just
//! above the local safety net.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::Responder;
use crate::config::GenerativeConfig;
use crate::error::StageError;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

pub struct GenerativeResponder {
    client: reqwest::Client,
    config: GenerativeConfig,
}

impl GenerativeResponder {
    pub fn new(config: GenerativeConfig) -> Result<Self, StageError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StageError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Responder for GenerativeResponder {
    fn name(&self) -> &str {
        "generative"
    }

    async fn respond(&self, text: &str, _user_id: &str) -> Result<Option<String>, StageError> {
        let mut request = self.client.post(&self.config.api_url).json(&GenerateRequest {
            model: &self.config.model,
            prompt: text,
            stream: false,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| StageError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::BadStatus {
                status: status.as_u16(),
            });
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| StageError::InvalidPayload(e.to_string()))?;

        let completion = payload.response.trim();
        Ok((!completion.is_empty()).then(|| completion.to_string()))
    }
}
