//! ci-runner - A declarative CI workflow runner
//!
//! Decides whether an event (push, pull request, schedule, manual dispatch)
//! triggers a workflow and runs its steps in order, stopping at the first
//! failure.

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::{
    Environment, Event, GitRef, PipelineRun, RunError, RunStatus, Step, StepState, Trigger,
    TriggerSet, Workflow,
};
pub use execution::{Dispatch, ExecutionEvent, PipelineRunner, ShellExecutor};
pub use persistence::{InMemoryArchive, RunArchive, RunSummary};
