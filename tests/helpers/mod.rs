//! Test utility functions for ci-runner

use async_trait::async_trait;
use ci_runner::core::config::WorkflowConfig;
use ci_runner::core::{Environment, PipelineRun, RunStatus, StepState, Workflow};
use ci_runner::execution::{CommandExecutor, CommandOutput, CommandSpec, ExecError, PipelineRunner};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mock executor that returns predefined outcomes per step and records
/// every command it is asked to run
///
/// Steps without a configured outcome succeed with empty output.
#[derive(Default)]
pub struct MockExecutor {
    outcomes: HashMap<String, Result<CommandOutput, ExecError>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step `step_id` exits with `code`
    pub fn exiting(mut self, step_id: &str, code: i32) -> Self {
        self.outcomes
            .insert(step_id.to_string(), Ok(CommandOutput::exited(code)));
        self
    }

    /// Step `step_id` produces `output`
    pub fn with_output(mut self, step_id: &str, output: CommandOutput) -> Self {
        self.outcomes.insert(step_id.to_string(), Ok(output));
        self
    }

    /// Step `step_id` never produces an exit status
    pub fn erroring(mut self, step_id: &str, error: ExecError) -> Self {
        self.outcomes.insert(step_id.to_string(), Err(error));
        self
    }

    /// Commands executed so far, in order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Step IDs executed so far, in order
    pub fn executed(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.step_id).collect()
    }

    pub fn call_for(&self, step_id: &str) -> Option<CommandSpec> {
        self.calls().into_iter().find(|call| call.step_id == step_id)
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(command.clone());
        self.outcomes
            .get(&command.step_id)
            .cloned()
            .unwrap_or_else(|| Ok(CommandOutput::success()))
    }
}

/// Parse a workflow from YAML string
pub fn workflow_from_yaml(yaml: &str) -> Workflow {
    let config = WorkflowConfig::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Failed to parse workflow YAML: {:#}", e));
    config
        .to_workflow()
        .unwrap_or_else(|e| panic!("Failed to build workflow: {:#}", e))
}

/// Run all of a workflow's steps with a mock executor in a fresh temp dir
pub async fn run_with_mock(
    workflow: Workflow,
    executor: MockExecutor,
) -> (PipelineRun, PipelineRunner<MockExecutor>) {
    let dir = tempfile::tempdir().unwrap();
    let steps = workflow.steps.clone();
    let runner = PipelineRunner::new(workflow, executor);
    let run = runner.run(&steps, &Environment::new(dir.path())).await;
    (run, runner)
}

/// Assert the run succeeded
pub fn assert_run_succeeded(run: &PipelineRun) {
    assert_eq!(
        run.status,
        RunStatus::Succeeded,
        "Run should have succeeded, but failed with: {:?}",
        run.failure
    );
    assert!(run.failure.is_none());
}

/// Assert the run failed
pub fn assert_run_failed(run: &PipelineRun) {
    assert_eq!(
        run.status,
        RunStatus::Failed,
        "Run should have failed, but was: {}",
        run.status
    );
}

/// Assert exactly these steps ran, in this order
pub fn assert_execution_order(run: &PipelineRun, expected_order: &[&str]) {
    assert_eq!(
        run.executed_steps(),
        expected_order,
        "Expected execution order: {:?}\nActual: {:?}",
        expected_order,
        run.executed_steps()
    );
}

/// Assert a step failed with an error containing `expected_error`
pub fn assert_step_failed(run: &PipelineRun, step_id: &str, expected_error: &str) {
    let result = run
        .step(step_id)
        .unwrap_or_else(|| panic!("Step '{}' not found in run", step_id));

    match &result.state {
        StepState::Failed { error, .. } => assert!(
            error.contains(expected_error),
            "Step '{}' error:\n{}\n\ndoes not contain:\n{}",
            step_id,
            error,
            expected_error
        ),
        other => panic!("Step '{}' should have failed, but was: {:?}", step_id, other),
    }
}

/// Assert a step never ran
pub fn assert_step_pending(run: &PipelineRun, step_id: &str) {
    let result = run
        .step(step_id)
        .unwrap_or_else(|| panic!("Step '{}' not found in run", step_id));
    assert_eq!(
        result.state,
        StepState::Pending,
        "Step '{}' should not have run",
        step_id
    );
}
