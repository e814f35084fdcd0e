//! Built-in plugin capability table.
//!
//! Plugins are registered explicitly at process start — no directory
//! scanning. The worker process rebuilds the same table by name, so both
//! sides of the sandbox agree on what a plugin name means.

use std::sync::Arc;

use super::{Plugin, PluginDescriptor};
use crate::error::PluginError;

/// Greets the sender. Demonstrates the minimal plugin shape.
pub struct HelloPlugin;

impl Plugin for HelloPlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("hello", "1.0").with_metadata("author", "system")
    }

    fn should_handle(&self, intent: &str) -> bool {
        intent == "greeting"
    }

    fn run(&self, _message: &str, sender_id: &str) -> Result<Option<String>, PluginError> {
        Ok(Some(format!("Hello, {sender_id}! The hello plugin says hi.")))
    }
}

/// Answers doctrinal and philosophical queries with a fixed reflective
/// reply.
pub struct DoctrinePlugin;

impl Plugin for DoctrinePlugin {
    fn descriptor(&self) -> PluginDescriptor {
        PluginDescriptor::new("doctrine", "1.0")
            .with_metadata("description", "Answers philosophical and religious queries")
    }

    fn should_handle(&self, intent: &str) -> bool {
        matches!(
            intent.to_lowercase().as_str(),
            "doctrine_query" | "religion" | "spirituality"
        )
    }

    fn run(&self, _message: &str, _sender_id: &str) -> Result<Option<String>, PluginError> {
        Ok(Some(
            "As per many teachings, clarity comes from within. Meditate on your \
             question and seek wisdom through reflection and study."
                .to_string(),
        ))
    }
}

/// The static capability table, in registration order.
pub fn default_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(HelloPlugin), Arc::new(DoctrinePlugin)]
}

/// Look a plugin up by name in the capability table.
pub fn find(name: &str) -> Option<Arc<dyn Plugin>> {
    default_plugins()
        .into_iter()
        .find(|p| p.descriptor().name == name)
}
