//! Command executor - the seam between the engine and the processes it runs

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// A fully resolved command, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Step the command belongs to (for logging)
    pub step_id: String,

    /// Shell program, invoked as `<program> -e -c <script>`
    pub program: String,

    /// Rendered command text
    pub script: String,

    pub working_dir: PathBuf,

    /// Complete environment of the child process
    pub variables: HashMap<String, String>,

    pub timeout_secs: u64,
}

/// Captured result of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Errors where the command never produced an exit status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("failed to start command: {0}")]
    Spawn(String),

    #[error("command timed out after {0} seconds")]
    Timeout(u64),
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run the command to completion, capturing its output
    async fn execute(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError>;
}
