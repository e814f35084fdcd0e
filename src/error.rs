//! Error types for chat-router.
//!
//! Only `PrivacyError` is ever user-visible (it aborts routing with a fixed
//! apology). Everything else is absorbed inside the router and manifests as
//! "this stage produced no reply".

use std::time::Duration;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Privacy error: {0}")]
    Privacy(#[from] PrivacyError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Privacy sanitization failure — the only fatal input error.
///
/// The router answers with a fixed apology and emits no fallback event.
#[derive(Debug, thiserror::Error)]
pub enum PrivacyError {
    #[error("Sanitization failed: {0}")]
    Sanitize(String),
}

/// Why a responder stage abstained.
///
/// Every variant is recoverable: the router logs it and falls through to
/// the next stage. Nothing here crosses the router boundary.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend returned status {status}")]
    BadStatus { status: u16 },

    #[error("Unusable payload from backend: {0}")]
    InvalidPayload(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Plugin sandbox failures — abstention variants, never escalated.
///
/// Exactly one of success / `Timeout` / `Crashed` is produced per
/// invocation.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Plugin {plugin} timed out after {timeout:?}")]
    Timeout { plugin: String, timeout: Duration },

    #[error("Plugin {plugin} crashed: {message}")]
    Crashed { plugin: String, message: String },

    #[error("Failed to spawn worker for plugin {plugin}: {reason}")]
    Spawn { plugin: String, reason: String },
}

/// A plugin's own failure, raised from its `run` handler.
///
/// On the legacy sweep path this is caught per plugin and the sweep
/// continues.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin execution failed: {0}")]
    Failed(String),

    #[error("Unknown plugin: {0}")]
    Unknown(String),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
