//! Pipeline run - one execution of a workflow's steps

use crate::core::{error::RunError, state::RunStatus, state::StepState, step::Step};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of one step within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step_id: String,
    pub name: String,
    pub state: StepState,
}

/// A single run, owning the results of its steps in execution order
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Unique run ID
    pub run_id: Uuid,

    pub workflow_name: String,

    /// Description of the trigger that started the run, if any
    pub trigger: Option<String>,

    pub status: RunStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    /// One entry per step, in declared order
    pub steps: Vec<StepResult>,

    /// The error that halted the run
    pub failure: Option<RunError>,
}

impl PipelineRun {
    pub fn new(workflow_name: impl Into<String>, steps: &[Step]) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            workflow_name: workflow_name.into(),
            trigger: None,
            status: RunStatus::Pending,
            started_at: None,
            completed_at: None,
            steps: steps
                .iter()
                .map(|step| StepResult {
                    step_id: step.id.clone(),
                    name: step.name.clone(),
                    state: StepState::Pending,
                })
                .collect(),
            failure: None,
        }
    }

    pub fn triggered_by(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark run as succeeded
    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self, error: RunError) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.failure = Some(error);
    }

    /// `Ok` for a successful run, the halting error otherwise
    pub fn result(&self) -> Result<(), RunError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// IDs of the steps that actually ran, in order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|result| result.state.is_terminal())
            .map(|result| result.step_id.as_str())
            .collect()
    }

    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps
            .iter()
            .find(|result| matches!(result.state, StepState::Failed { .. }))
    }

    pub fn step(&self, id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|result| result.step_id == id)
    }

    pub fn succeeded_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|result| result.state.is_success())
            .count()
    }

    /// Calculate progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.executed_steps().len() as f64 / self.steps.len() as f64
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}
