//! Project test gate.

use std::path::PathBuf;

use async_trait::async_trait;
use slipway_core::stage::TestGate;
use slipway_core::{Error, Result};
use tokio::process::Command;
use tracing::info;

/// Runs the configured test command on the host, with stdio inherited so
/// test output streams straight through to the operator.
pub struct HostTestGate {
    command: Vec<String>,
    working_dir: PathBuf,
}

impl HostTestGate {
    pub fn new(command: Vec<String>, working_dir: impl Into<PathBuf>) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::InvalidInput("test command is empty".to_string()));
        }
        Ok(Self {
            command,
            working_dir: working_dir.into(),
        })
    }
}

#[async_trait]
impl TestGate for HostTestGate {
    async fn run(&self) -> Result<()> {
        info!(command = ?self.command, "Running test gate");

        let status = Command::new(&self.command[0])
            .args(&self.command[1..])
            .current_dir(&self.working_dir)
            .status()
            .await
            .map_err(|e| {
                Error::Internal(format!(
                    "failed to run test command '{}': {}",
                    self.command[0], e
                ))
            })?;

        if !status.success() {
            return Err(Error::TestsFailed {
                exit_code: status.code(),
            });
        }

        info!("Test gate passed");
        Ok(())
    }
}
