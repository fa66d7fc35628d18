//! CLI command definitions

use crate::core::{Event, GitRef};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

/// Kind of event to simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventKind {
    Push,
    PullRequest,
    Schedule,
    WorkflowDispatch,
}

/// Describes the incoming event
#[derive(Debug, Args, Clone)]
pub struct EventArgs {
    /// Event type
    #[arg(long, value_enum, default_value_t = EventKind::WorkflowDispatch)]
    pub event: EventKind,

    /// Pushed branch, or the base branch of a pull request
    #[arg(long, conflicts_with = "tag")]
    pub branch: Option<String>,

    /// Pushed tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Full pushed ref (refs/heads/... or refs/tags/...)
    #[arg(long = "ref", conflicts_with_all = ["branch", "tag"])]
    pub git_ref: Option<String>,

    /// Revision to check out (exported as CI_SHA)
    #[arg(long)]
    pub sha: Option<String>,

    /// Schedule time (RFC 3339), defaults to now
    #[arg(long)]
    pub at: Option<String>,
}

impl EventArgs {
    /// Build the event these arguments describe
    pub fn to_event(&self) -> Result<Event> {
        let event = match self.event {
            EventKind::Push => {
                let git_ref = match (&self.git_ref, &self.branch, &self.tag) {
                    (Some(full), _, _) => GitRef::parse(full),
                    (None, Some(branch), _) => GitRef::Branch(branch.clone()),
                    (None, None, Some(tag)) => GitRef::Tag(tag.clone()),
                    (None, None, None) => {
                        anyhow::bail!("A push event needs --branch, --tag or --ref")
                    }
                };
                Event::Push {
                    git_ref,
                    revision: None,
                }
            }
            EventKind::PullRequest => {
                let base = self
                    .branch
                    .as_deref()
                    .context("A pull request event needs --branch (the base branch)")?;
                Event::pull_request(base)
            }
            EventKind::Schedule => {
                let at = match &self.at {
                    Some(at) => DateTime::parse_from_rfc3339(at)
                        .with_context(|| format!("Invalid --at timestamp: {}", at))?
                        .with_timezone(&Utc),
                    None => Utc::now(),
                };
                Event::schedule(at)
            }
            EventKind::WorkflowDispatch => Event::manual(),
        };

        Ok(match &self.sha {
            Some(sha) => event.with_revision(sha.clone()),
            None => event,
        })
    }
}

/// Run a workflow for an event
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub event: EventArgs,

    /// Directory the steps run in (defaults to the current directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Grant at most read access, so workflows needing write are refused
    #[arg(long)]
    pub read_only: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Run even if no trigger matches the event
    #[arg(long)]
    pub force: bool,
}

/// Check whether an event would start a run
#[derive(Debug, Args, Clone)]
pub struct EvaluateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub event: EventArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run a workflow whenever its schedule fires
#[derive(Debug, Args, Clone)]
pub struct WatchCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Directory the steps run in (defaults to the current directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Grant at most read access
    #[arg(long)]
    pub read_only: bool,

    /// Don't save runs to history
    #[arg(long)]
    pub no_history: bool,

    /// Stop after the first scheduled run
    #[arg(long)]
    pub once: bool,
}

/// List workflows with archived runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short = 'n', long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub details: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
