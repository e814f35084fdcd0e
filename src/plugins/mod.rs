//! Plugin system: capability trait, registry, and sandboxed execution.
//!
//! Plugins are third-party/unreviewed extension code. The mapped routing
//! path runs them in a worker process behind [`Sandbox`]; only the legacy
//! sweep calls them in-process.

pub mod builtin;
pub mod registry;
pub mod sandbox;
pub mod worker;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

pub use registry::{PluginMapping, PluginRegistry};
pub use sandbox::{ProcessSandbox, Sandbox};

/// Plugin identity and metadata. Identity is the name; the registry holds
/// at most one plugin per name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Fixed capability interface every plugin implements.
///
/// Handlers are synchronous: on the mapped path they run inside the worker
/// process, on the legacy sweep they are expected to be cheap.
pub trait Plugin: Send + Sync {
    /// Plugin metadata.
    fn descriptor(&self) -> PluginDescriptor;

    /// Whether this plugin wants to handle the given intent.
    fn should_handle(&self, intent: &str) -> bool;

    /// Produce a reply for the message, or `None` to decline.
    fn run(&self, message: &str, sender_id: &str) -> Result<Option<String>, PluginError>;
}
