//! Process-based plugin sandbox.
//!
//! Plugin code is third-party and must never be able to hang or crash the
//! routing process, so the mapped path runs it in a worker **child
//! process**: the router re-executes its own binary in worker mode (see
//! `plugins::worker`), pipes the input over stdin, and reads the reply
//! from stdout. The deadline is hard — when it expires the child is
//! killed. Exactly one outcome (reply, timeout, or crash) is produced per
//! invocation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::worker::WORKER_ARG;
use crate::error::SandboxError;

/// Executes a named plugin against input text in isolation.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn run(
        &self,
        plugin_name: &str,
        input: &str,
        sender_id: &str,
        timeout: Duration,
    ) -> Result<String, SandboxError>;
}

/// Worker-process sandbox. The default worker is the current executable
/// in `plugin-worker` mode; tests may point it at any program that speaks
/// the same stdin/stdout protocol.
pub struct ProcessSandbox {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSandbox {
    /// Sandbox whose worker is this binary re-executed in worker mode.
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec![WORKER_ARG.to_string()],
        })
    }

    /// Sandbox with an explicit worker program (for tests).
    pub fn with_worker(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn run(
        &self,
        plugin_name: &str,
        input: &str,
        sender_id: &str,
        timeout: Duration,
    ) -> Result<String, SandboxError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(plugin_name)
            .arg(sender_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must take the child with it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Spawn {
                plugin: plugin_name.to_string(),
                reason: e.to_string(),
            })?;

        let stdin = child.stdin.take();

        // The whole interaction sits under one deadline. A worker that
        // never reads its stdin would otherwise block the write forever
        // once the input outgrows the pipe buffer.
        let interaction = async {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes()).await?;
                // Close stdin so the worker sees EOF.
                drop(stdin);
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(timeout, interaction).await {
            Ok(result) => result.map_err(|e| SandboxError::Crashed {
                plugin: plugin_name.to_string(),
                message: e.to_string(),
            })?,
            Err(_) => {
                debug!(plugin = %plugin_name, ?timeout, "Plugin worker killed at deadline");
                return Err(SandboxError::Timeout {
                    plugin: plugin_name.to_string(),
                    timeout,
                });
            }
        };

        if !output.status.success() {
            // Only the captured error message crosses the boundary.
            let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SandboxError::Crashed {
                plugin: plugin_name.to_string(),
                message: if message.is_empty() {
                    format!("worker exited with {}", output.status)
                } else {
                    message
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
