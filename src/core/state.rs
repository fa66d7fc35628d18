//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is executing steps
    Running,
    /// Every step succeeded
    Succeeded,
    /// A step failed and the run halted
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// State of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not run (either not reached yet, or skipped after a failure)
    Pending,
    /// Step command is running
    Running { started_at: DateTime<Utc> },
    /// Command exited with status zero
    Succeeded {
        exit_code: i32,
        stdout: String,
        stderr: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Command failed, timed out, could not start, or lacked an input
    Failed {
        exit_code: Option<i32>,
        error: String,
        stdout: String,
        stderr: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Succeeded { .. } | StepState::Failed { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepState::Succeeded { .. })
    }

    /// Short label for display (`pending`, `success`, `failure`)
    pub fn label(&self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Running { .. } => "running",
            StepState::Succeeded { .. } => "success",
            StepState::Failed { .. } => "failure",
        }
    }

    /// Wall time spent in the step, for finished steps
    pub fn duration(&self) -> Option<chrono::Duration> {
        match self {
            StepState::Succeeded {
                started_at,
                finished_at,
                ..
            } => Some(*finished_at - *started_at),
            StepState::Failed {
                started_at,
                failed_at,
                ..
            } => Some(*failed_at - *started_at),
            _ => None,
        }
    }
}
