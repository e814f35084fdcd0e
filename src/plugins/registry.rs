//! Plugin registry: intent→plugin mapping and per-user enablement.
//!
//! The mapping is an external JSON document reloaded on every routed
//! message; a missing or malformed file is an empty mapping, never an
//! error to the caller. Enablement defaults to **disabled** on every path
//! — plugins are untrusted, so a user must be opted in explicitly.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::Plugin;

/// Read-only intent→plugin-name mapping.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(transparent)]
pub struct PluginMapping {
    map: HashMap<String, String>,
}

impl PluginMapping {
    pub fn get(&self, intent: &str) -> Option<&str> {
        self.map.get(intent).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Registry of plugin instances, their intent registrations, and per-user
/// enablement flags.
pub struct PluginRegistry {
    /// Capability table in registration order (fixed at construction).
    plugins: Vec<Arc<dyn Plugin>>,
    mapping_path: Option<PathBuf>,
    enablement: RwLock<HashMap<(String, String), bool>>,
    intent_index: RwLock<HashMap<String, HashSet<String>>>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>, mapping_path: Option<PathBuf>) -> Self {
        Self {
            plugins,
            mapping_path,
            enablement: RwLock::new(HashMap::new()),
            intent_index: RwLock::new(HashMap::new()),
        }
    }

    /// All plugins in registration order.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Look a plugin up by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .find(|p| p.descriptor().name == name)
            .cloned()
    }

    /// Read the current intent→plugin mapping.
    ///
    /// Tolerant by contract: no path, unreadable file, or malformed JSON
    /// all yield an empty mapping.
    pub async fn load_mapping(&self) -> PluginMapping {
        let Some(path) = &self.mapping_path else {
            return PluginMapping::default();
        };
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Plugin mapping unreadable, using empty");
                return PluginMapping::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Plugin mapping malformed, using empty");
                PluginMapping::default()
            }
        }
    }

    /// Whether a plugin is enabled for a user. Absent entries are
    /// **disabled** — the same default on the mapped path and the legacy
    /// sweep.
    pub async fn is_enabled(&self, user_id: &str, plugin_name: &str) -> bool {
        self.enablement
            .read()
            .await
            .get(&(user_id.to_string(), plugin_name.to_string()))
            .copied()
            .unwrap_or(false)
    }

    /// Enable a plugin for a user.
    pub async fn enable(&self, user_id: &str, plugin_name: &str) {
        self.enablement
            .write()
            .await
            .insert((user_id.to_string(), plugin_name.to_string()), true);
    }

    /// Disable a plugin for a user.
    pub async fn disable(&self, user_id: &str, plugin_name: &str) {
        self.enablement
            .write()
            .await
            .insert((user_id.to_string(), plugin_name.to_string()), false);
    }

    /// Names of plugins enabled for a user.
    pub async fn list_enabled(&self, user_id: &str) -> HashSet<String> {
        self.enablement
            .read()
            .await
            .iter()
            .filter(|((uid, _), enabled)| uid == user_id && **enabled)
            .map(|((_, name), _)| name.clone())
            .collect()
    }

    /// Record which intents a plugin claims. Administrative bookkeeping;
    /// the routing hot path reads the mapping document instead.
    pub async fn register_intents(&self, plugin_name: &str, intents: HashSet<String>) {
        let mut index = self.intent_index.write().await;
        for intent in intents {
            index.entry(intent).or_default().insert(plugin_name.to_string());
        }
    }

    /// Plugins registered for an intent.
    pub async fn plugins_for_intent(&self, intent: &str) -> HashSet<String> {
        self.intent_index
            .read()
            .await
            .get(intent)
            .cloned()
            .unwrap_or_default()
    }
}
