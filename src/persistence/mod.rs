//! Run archive - history of finished runs

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{PipelineRun, RunStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Archived form of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    pub workflow_name: String,

    /// Trigger that started the run
    pub trigger: Option<String>,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub total_steps: usize,

    pub succeeded_steps: usize,

    /// Step that halted the run
    pub failed_step: Option<String>,

    /// Error that halted the run
    pub error: Option<String>,
}

impl RunSummary {
    /// Create a summary from a run
    pub fn from_run(run: &PipelineRun) -> Self {
        Self {
            run_id: run.run_id,
            workflow_name: run.workflow_name.clone(),
            trigger: run.trigger.clone(),
            status: run.status,
            started_at: run.started_at.unwrap_or_else(Utc::now),
            completed_at: run.completed_at,
            total_steps: run.steps.len(),
            succeeded_steps: run.succeeded_count(),
            failed_step: run.failed_step().map(|result| result.step_id.clone()),
            error: run.failure.as_ref().map(|error| error.to_string()),
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}

/// Trait for archive backends
#[async_trait::async_trait]
pub trait RunArchive: Send + Sync {
    /// Store a finished run (replacing any summary with the same ID)
    async fn archive(&self, summary: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// All runs of a workflow, newest first
    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>>;

    /// Names of all workflows with archived runs, sorted
    async fn list_workflows(&self) -> Result<Vec<String>>;

    /// Most recent runs across all workflows, newest first
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>>;
}

/// In-memory archive (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryArchive {
    runs: tokio::sync::RwLock<Vec<RunSummary>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut runs: Vec<RunSummary>) -> Vec<RunSummary> {
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }
}

#[async_trait::async_trait]
impl RunArchive for InMemoryArchive {
    async fn archive(&self, summary: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.retain(|run| run.run_id != summary.run_id);
        runs.push(summary.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|run| run.run_id == run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(Self::newest_first(
            runs.iter()
                .filter(|run| run.workflow_name == workflow_name)
                .cloned()
                .collect(),
        ))
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let names: BTreeSet<String> = runs.iter().map(|run| run.workflow_name.clone()).collect();
        Ok(names.into_iter().collect())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut recent = Self::newest_first(runs.clone());
        recent.truncate(limit);
        Ok(recent)
    }
}
