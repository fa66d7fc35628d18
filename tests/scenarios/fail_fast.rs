//! Test: Fail Fast - the first failing step halts the run

use crate::helpers::*;
use ci_runner::core::{RunError, StepState};
use ci_runner::execution::{CommandOutput, ExecError};

const THREE_STEPS: &str = r#"
name: "Test: Fail Fast"
on:
  workflow_dispatch:
steps:
  - id: A
    run: make a
  - id: B
    run: make b
  - id: C
    run: make c
"#;

/// Given [A(success), B(failure), C(success)], A and B run, C does not
#[tokio::test]
async fn test_failure_stops_later_steps() {
    let executor = MockExecutor::new().exiting("B", 1);
    let (run, runner) = run_with_mock(workflow_from_yaml(THREE_STEPS), executor).await;

    assert_run_failed(&run);
    assert_execution_order(&run, &["A", "B"]);
    assert_step_pending(&run, "C");
    assert_eq!(runner.executor().executed(), vec!["A", "B"]);
    assert_eq!(
        run.failure,
        Some(RunError::StepFailed {
            step: "B".to_string(),
            exit_code: 1,
        })
    );
}

#[tokio::test]
async fn test_failing_first_step_runs_nothing_else() {
    let executor = MockExecutor::new().exiting("A", 127);
    let (run, runner) = run_with_mock(workflow_from_yaml(THREE_STEPS), executor).await;

    assert_run_failed(&run);
    assert_execution_order(&run, &["A"]);
    assert_step_failed(&run, "A", "exit code 127");
    assert_step_pending(&run, "B");
    assert_step_pending(&run, "C");
    assert_eq!(runner.executor().executed(), vec!["A"]);
}

#[tokio::test]
async fn test_failed_step_keeps_its_output() {
    let executor = MockExecutor::new().with_output(
        "B",
        CommandOutput::exited(2)
            .with_stdout("checking...")
            .with_stderr("lint: 3 problems"),
    );
    let (run, _) = run_with_mock(workflow_from_yaml(THREE_STEPS), executor).await;

    match &run.step("B").unwrap().state {
        StepState::Failed {
            exit_code,
            stdout,
            stderr,
            ..
        } => {
            assert_eq!(*exit_code, Some(2));
            assert_eq!(stdout, "checking...");
            assert_eq!(stderr, "lint: 3 problems");
        }
        other => panic!("B should have failed, but was: {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_and_signal_halt_like_failures() {
    let executor = MockExecutor::new().erroring("B", ExecError::Timeout(30));
    let (run, _) = run_with_mock(workflow_from_yaml(THREE_STEPS), executor).await;
    assert_run_failed(&run);
    assert_step_failed(&run, "B", "timed out after 30 seconds");
    assert_step_pending(&run, "C");

    let killed = CommandOutput {
        exit_code: None,
        ..CommandOutput::default()
    };
    let executor = MockExecutor::new().with_output("A", killed);
    let (run, _) = run_with_mock(workflow_from_yaml(THREE_STEPS), executor).await;
    assert_eq!(
        run.failure,
        Some(RunError::StepTerminated {
            step: "A".to_string(),
        })
    );
    assert_step_pending(&run, "B");
}

#[tokio::test]
async fn test_spawn_failure_halts_run() {
    let executor =
        MockExecutor::new().erroring("A", ExecError::Spawn("bash: not found".to_string()));
    let (run, _) = run_with_mock(workflow_from_yaml(THREE_STEPS), executor).await;

    assert_run_failed(&run);
    assert!(matches!(run.failure, Some(RunError::Spawn { ref step, .. }) if step == "A"));
    assert_eq!(run.failure.as_ref().and_then(|e| e.exit_code()), None);
}
