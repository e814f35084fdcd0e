//! Chat Router — fallback orchestration core.

pub mod config;
pub mod error;
pub mod nlu;
pub mod plugins;
pub mod privacy;
pub mod responders;
pub mod router;
pub mod session;
