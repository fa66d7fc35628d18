//! Core domain models
//!
//! Workflows, triggers, steps and runs, plus the YAML configuration they
//! are loaded from.

pub mod config;
pub mod cron;
pub mod environment;
pub mod error;
pub mod permissions;
pub mod run;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use cron::{CronError, CronSchedule};
pub use environment::*;
pub use error::RunError;
pub use permissions::{PermissionLevel, Permissions};
pub use run::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
pub use workflow::*;
