//! Main execution engine - evaluates triggers and runs workflows

use crate::{
    core::{
        Environment, Event, PipelineRun, RunError, RunStatus, Step, StepState, Workflow,
    },
    execution::{
        executor::{CommandExecutor, CommandOutput, CommandSpec, ExecError},
        lock::RunLock,
    },
    persistence::{RunArchive, RunSummary},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow_name: String,
        trigger: Option<String>,
        total_steps: usize,
    },
    StepStarted {
        step_id: String,
        name: String,
        index: usize,
        total: usize,
    },
    StepOutput {
        step_id: String,
        stdout: String,
        stderr: String,
    },
    StepSucceeded {
        step_id: String,
        duration: chrono::Duration,
    },
    StepFailed {
        step_id: String,
        error: RunError,
    },
    /// Step never ran because an earlier step failed
    StepSkipped {
        step_id: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Outcome of dispatching an event
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// No trigger matched; no run was created
    NotTriggered,
    /// A run was created and executed (it may still have failed)
    Completed(PipelineRun),
}

impl Dispatch {
    pub fn run(&self) -> Option<&PipelineRun> {
        match self {
            Dispatch::NotTriggered => None,
            Dispatch::Completed(run) => Some(run),
        }
    }

    pub fn into_run(self) -> Option<PipelineRun> {
        match self {
            Dispatch::NotTriggered => None,
            Dispatch::Completed(run) => Some(run),
        }
    }
}

/// Runs one workflow's steps with a command executor
pub struct PipelineRunner<E> {
    workflow: Workflow,
    executor: E,
    event_handlers: Vec<EventHandler>,
    archive: Option<Arc<dyn RunArchive>>,
}

impl<E: CommandExecutor> PipelineRunner<E> {
    pub fn new(workflow: Workflow, executor: E) -> Self {
        Self {
            workflow,
            executor,
            event_handlers: Vec::new(),
            archive: None,
        }
    }

    /// Archive every dispatched run
    pub fn with_archive(mut self, archive: Arc<dyn RunArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// True if `event` would start a run. No side effects.
    pub fn evaluate(&self, event: &Event) -> bool {
        self.workflow.evaluate(event)
    }

    /// Execute `steps` in order, stopping at the first failure
    ///
    /// Takes no lock and checks no permissions; `dispatch` does both.
    pub async fn run(&self, steps: &[Step], environment: &Environment) -> PipelineRun {
        let run = PipelineRun::new(&self.workflow.name, steps);
        self.execute(run, steps, environment).await
    }

    /// Evaluate the event and, if it matches, run the workflow
    pub async fn dispatch(
        &self,
        event: &Event,
        environment: &Environment,
    ) -> Result<Dispatch, RunError> {
        let trigger = match self.workflow.triggers.matching(event) {
            Some(trigger) => trigger.to_string(),
            None => {
                info!(
                    "Workflow {} not triggered by {}",
                    self.workflow.name, event
                );
                return Ok(Dispatch::NotTriggered);
            }
        };

        info!("Workflow {} triggered by {} ({})", self.workflow.name, event, trigger);
        self.start_run(event, environment, trigger)
            .await
            .map(Dispatch::Completed)
    }

    /// Run the workflow for `event` without evaluating its triggers
    pub async fn force_dispatch(
        &self,
        event: &Event,
        environment: &Environment,
    ) -> Result<PipelineRun, RunError> {
        warn!("Skipping trigger evaluation for {}", event);
        self.start_run(event, environment, format!("forced {}", event.kind()))
            .await
    }

    async fn start_run(
        &self,
        event: &Event,
        environment: &Environment,
        trigger: String,
    ) -> Result<PipelineRun, RunError> {
        environment.permissions.check(&self.workflow.permissions)?;

        let _lock = RunLock::acquire(environment.working_dir(), &self.workflow.name)?;

        let environment = environment.clone().for_event(event);
        let run = PipelineRun::new(&self.workflow.name, &self.workflow.steps).triggered_by(trigger);
        let run = self
            .execute(run, &self.workflow.steps, &environment)
            .await;

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.archive(&RunSummary::from_run(&run)).await {
                warn!("Failed to archive run {}: {:#}", run.run_id, e);
            }
        }

        Ok(run)
    }

    async fn execute(
        &self,
        mut run: PipelineRun,
        steps: &[Step],
        environment: &Environment,
    ) -> PipelineRun {
        info!(
            "Starting run {} of {} ({} steps)",
            run.run_id,
            run.workflow_name,
            steps.len()
        );
        run.start();
        self.emit_event(ExecutionEvent::RunStarted {
            run_id: run.run_id,
            workflow_name: run.workflow_name.clone(),
            trigger: run.trigger.clone(),
            total_steps: steps.len(),
        });

        let total = steps.len();
        for (index, step) in steps.iter().enumerate() {
            let started_at = Utc::now();
            run.steps[index].state = StepState::Running { started_at };
            self.emit_event(ExecutionEvent::StepStarted {
                step_id: step.id.clone(),
                name: step.name.clone(),
                index,
                total,
            });

            let (state, failure) = self.execute_step(step, environment, started_at).await;
            run.steps[index].state = state;

            if let Some(error) = failure {
                error!("Run {} halted: {}", run.run_id, error);
                self.emit_event(ExecutionEvent::StepFailed {
                    step_id: step.id.clone(),
                    error: error.clone(),
                });
                for skipped in &steps[index + 1..] {
                    self.emit_event(ExecutionEvent::StepSkipped {
                        step_id: skipped.id.clone(),
                    });
                }
                run.fail(error);
                break;
            }

            self.emit_event(ExecutionEvent::StepSucceeded {
                step_id: step.id.clone(),
                duration: Utc::now() - started_at,
            });
        }

        if run.status == RunStatus::Running {
            run.succeed();
        }

        info!("Run {} finished: {}", run.run_id, run.status);
        self.emit_event(ExecutionEvent::RunCompleted {
            run_id: run.run_id,
            status: run.status,
        });

        run
    }

    /// Execute a single step, returning its final state and the error that
    /// halts the run, if any
    async fn execute_step(
        &self,
        step: &Step,
        environment: &Environment,
        started_at: chrono::DateTime<Utc>,
    ) -> (StepState, Option<RunError>) {
        info!("Executing step: {}", step.id);

        let variables = environment.variables_for(step, &self.workflow.env);

        if let Some(name) = step.missing_inputs(&variables).first() {
            let error = RunError::MissingInput {
                step: step.id.clone(),
                name: name.to_string(),
            };
            return (
                Self::failed_state(None, &error, CommandOutput::default(), started_at),
                Some(error),
            );
        }

        let command = CommandSpec {
            step_id: step.id.clone(),
            program: step.shell.clone(),
            script: step.render_command(&variables),
            working_dir: environment.resolve_working_dir(step),
            variables,
            timeout_secs: step.timeout_secs,
        };
        debug!("Command for step {}: {}", step.id, command.script);

        let output = match self.executor.execute(&command).await {
            Ok(output) => output,
            Err(e) => {
                let error = match e {
                    ExecError::Spawn(message) => RunError::Spawn {
                        step: step.id.clone(),
                        message,
                    },
                    ExecError::Timeout(secs) => RunError::TimedOut {
                        step: step.id.clone(),
                        secs,
                    },
                };
                return (
                    Self::failed_state(None, &error, CommandOutput::default(), started_at),
                    Some(error),
                );
            }
        };

        if !output.stdout.is_empty() || !output.stderr.is_empty() {
            self.emit_event(ExecutionEvent::StepOutput {
                step_id: step.id.clone(),
                stdout: output.stdout.clone(),
                stderr: output.stderr.clone(),
            });
        }

        match output.exit_code {
            Some(0) => {
                info!("Step {} completed successfully", step.id);
                (
                    StepState::Succeeded {
                        exit_code: 0,
                        stdout: output.stdout,
                        stderr: output.stderr,
                        started_at,
                        finished_at: Utc::now(),
                    },
                    None,
                )
            }
            Some(code) => {
                let error = RunError::StepFailed {
                    step: step.id.clone(),
                    exit_code: code,
                };
                (
                    Self::failed_state(Some(code), &error, output, started_at),
                    Some(error),
                )
            }
            None => {
                let error = RunError::StepTerminated {
                    step: step.id.clone(),
                };
                (
                    Self::failed_state(None, &error, output, started_at),
                    Some(error),
                )
            }
        }
    }

    fn failed_state(
        exit_code: Option<i32>,
        error: &RunError,
        output: CommandOutput,
        started_at: chrono::DateTime<Utc>,
    ) -> StepState {
        StepState::Failed {
            exit_code,
            error: error.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
            started_at,
            failed_at: Utc::now(),
        }
    }
}
