//! Process Command Executor
//!
//! Implements `CommandExecutor` by spawning real programs.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::domain::I2cError;
use crate::ports::outbound::{CommandExecutor, CommandOutput};

/// Runs external programs with `tokio::process`, bounded by a timeout.
pub struct ProcessCommandExecutor {
    timeout: Duration,
}

impl ProcessCommandExecutor {
    /// Create an executor that kills programs running longer than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, I2cError> {
        debug!(program, args = ?args, "[bsp-i2c] Running command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| I2cError::Infrastructure {
                operation: format!("running {}", program),
                reason: format!("timed out after {:?}", self.timeout),
            })?
            .map_err(|e| I2cError::CommandSpawn {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
