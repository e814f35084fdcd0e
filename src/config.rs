//! Configuration types.
//!
//! Everything is overridable through `CHAT_ROUTER_*` environment variables;
//! defaults assume local development (Rasa on :5005, Ollama on :11434).

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Dialogue-engine (structured dialogue) adapter configuration.
#[derive(Debug, Clone)]
pub struct DialogueConfig {
    /// Whether the dialogue stage participates in routing at all.
    pub enabled: bool,
    /// Base URL of the dialogue engine REST endpoint.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:5005".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Generative-backend adapter configuration.
#[derive(Debug, Clone)]
pub struct GenerativeConfig {
    /// Completion endpoint URL.
    pub api_url: String,
    /// Model name passed in the request payload.
    pub model: String,
    /// Optional bearer token for hosted backends.
    pub api_key: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/api/generate".to_string(),
            model: "mistral".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Dialogue-engine adapter settings.
    pub dialogue: DialogueConfig,
    /// Generative-backend adapter settings.
    pub generative: GenerativeConfig,
    /// How many passages the retrieval adapter asks for.
    pub retrieval_k: usize,
    /// Hard deadline for a sandboxed plugin run.
    pub sandbox_timeout: Duration,
    /// Path to the intent→plugin mapping document (JSON). `None` means
    /// no mapped-plugin path.
    pub plugin_mapping_path: Option<PathBuf>,
    /// Path to the intent pattern database (JSON). `None` uses built-ins.
    pub intents_path: Option<PathBuf>,
    /// Directory of plain-text documents for the retrieval index. `None`
    /// leaves the index empty.
    pub docs_path: Option<PathBuf>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            dialogue: DialogueConfig::default(),
            generative: GenerativeConfig::default(),
            retrieval_k: 3,
            sandbox_timeout: Duration::from_secs(3),
            plugin_mapping_path: None,
            intents_path: None,
            docs_path: None,
        }
    }
}

impl RouterConfig {
    /// Build a configuration from `CHAT_ROUTER_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("CHAT_ROUTER_DIALOGUE_ENABLED") {
            config.dialogue.enabled = parse_bool("CHAT_ROUTER_DIALOGUE_ENABLED", &v)?;
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_DIALOGUE_URL") {
            config.dialogue.base_url = v;
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_DIALOGUE_TIMEOUT_SECS") {
            config.dialogue.timeout =
                Duration::from_secs(parse_u64("CHAT_ROUTER_DIALOGUE_TIMEOUT_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_LLM_URL") {
            config.generative.api_url = v;
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_LLM_MODEL") {
            config.generative.model = v;
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_LLM_API_KEY") {
            config.generative.api_key = Some(SecretString::from(v));
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_LLM_TIMEOUT_SECS") {
            config.generative.timeout =
                Duration::from_secs(parse_u64("CHAT_ROUTER_LLM_TIMEOUT_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_RETRIEVAL_K") {
            config.retrieval_k = parse_u64("CHAT_ROUTER_RETRIEVAL_K", &v)? as usize;
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_SANDBOX_TIMEOUT_SECS") {
            config.sandbox_timeout =
                Duration::from_secs(parse_u64("CHAT_ROUTER_SANDBOX_TIMEOUT_SECS", &v)?);
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_PLUGIN_MAPPING") {
            config.plugin_mapping_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_INTENTS") {
            config.intents_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("CHAT_ROUTER_DOCS") {
            config.docs_path = Some(PathBuf::from(v));
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected an integer, got '{value}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local_dev() {
        let config = RouterConfig::default();
        assert!(!config.dialogue.enabled);
        assert_eq!(config.retrieval_k, 3);
        assert_eq!(config.sandbox_timeout, Duration::from_secs(3));
        assert!(config.plugin_mapping_path.is_none());
    }

    #[test]
    fn parse_bool_accepts_common_forms() {
        assert!(parse_bool("K", "true").unwrap());
        assert!(parse_bool("K", "1").unwrap());
        assert!(!parse_bool("K", "no").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
    }

    #[test]
    fn parse_u64_rejects_garbage() {
        assert_eq!(parse_u64("K", "42").unwrap(), 42);
        assert!(parse_u64("K", "fast").is_err());
    }
}
