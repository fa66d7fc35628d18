//! Workflow execution

pub mod engine;
pub mod executor;
pub mod lock;
pub mod shell;
pub mod watcher;

pub use engine::{Dispatch, EventHandler, ExecutionEvent, PipelineRunner};
pub use executor::{CommandExecutor, CommandOutput, CommandSpec, ExecError};
pub use lock::RunLock;
pub use shell::ShellExecutor;
pub use watcher::ScheduleWatcher;
