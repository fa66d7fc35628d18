//! Shell executor - runs step commands as subprocesses

use crate::execution::executor::{CommandExecutor, CommandOutput, CommandSpec, ExecError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Executes commands through a local shell
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    /// Calls `<shell> -e -c <script>` and captures stdout and stderr.
    ///
    /// The child is killed if the timeout elapses.
    async fn execute(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError> {
        debug!(
            "Spawning {} for step {} in {}",
            command.program,
            command.step_id,
            command.working_dir.display()
        );

        let child = Command::new(&command.program)
            .arg("-e")
            .arg("-c")
            .arg(&command.script)
            .current_dir(&command.working_dir)
            .env_clear()
            .envs(&command.variables)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecError::Spawn(format!(
                    "{} in {}: {}",
                    command.program,
                    command.working_dir.display(),
                    e
                ))
            })?;

        let output = timeout(
            Duration::from_secs(command.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            warn!(
                "Step {} exceeded {}s, killing it",
                command.step_id, command.timeout_secs
            );
            ExecError::Timeout(command.timeout_secs)
        })?
        .map_err(|e| ExecError::Spawn(format!("failed to wait for command: {}", e)))?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            "Step {} exited with {:?} ({} bytes stdout, {} bytes stderr)",
            command.step_id,
            result.exit_code,
            result.stdout.len(),
            result.stderr.len()
        );

        Ok(result)
    }
}
