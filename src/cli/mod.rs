//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    EvaluateCommand, HistoryCommand, ListCommand, RunCommand, ValidateCommand, WatchCommand,
};
use std::ffi::OsString;

/// Declarative CI workflow runner
#[derive(Debug, Parser, Clone)]
#[command(name = "ci-runner")]
#[command(version)]
#[command(about = "Evaluate workflow triggers and run steps fail-fast", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print step output as steps finish
    #[arg(short, long, global = true)]
    pub stream: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a workflow for an event
    Run(RunCommand),

    /// Check whether an event would trigger a workflow
    Evaluate(EvaluateCommand),

    /// Validate a workflow configuration
    Validate(ValidateCommand),

    /// Run a workflow on its cron schedule
    Watch(WatchCommand),

    /// Show run history
    History(HistoryCommand),

    /// List workflows in history
    List(ListCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
