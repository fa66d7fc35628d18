//! Errors that halt or prevent a pipeline run

use crate::core::permissions::PermissionLevel;
use std::path::PathBuf;
use thiserror::Error;

/// Why a run stopped (or never started)
///
/// Every step-level variant halts the run the same way: later steps are
/// never executed and the run's status becomes failed. There are no retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("step '{step}' failed with exit code {exit_code}")]
    StepFailed { step: String, exit_code: i32 },

    #[error("step '{step}' was terminated by a signal")]
    StepTerminated { step: String },

    #[error("step '{step}' could not be started: {message}")]
    Spawn { step: String, message: String },

    #[error("step '{step}' timed out after {secs} seconds")]
    TimedOut { step: String, secs: u64 },

    #[error("step '{step}' requires input '{name}' which is not set")]
    MissingInput { step: String, name: String },

    #[error("permission '{scope}: {required}' is required but only '{granted}' is granted")]
    PermissionDenied {
        scope: String,
        required: PermissionLevel,
        granted: PermissionLevel,
    },

    #[error("another run is in progress (lock held at {})", .path.display())]
    AlreadyRunning { path: PathBuf },

    #[error("failed to create run lock at {}: {message}", .path.display())]
    Lock { path: PathBuf, message: String },
}

impl RunError {
    /// The step that caused the failure, if the error is step-level
    pub fn step(&self) -> Option<&str> {
        match self {
            RunError::StepFailed { step, .. }
            | RunError::StepTerminated { step }
            | RunError::Spawn { step, .. }
            | RunError::TimedOut { step, .. }
            | RunError::MissingInput { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Exit code of the failing command, when it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunError::StepFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}
