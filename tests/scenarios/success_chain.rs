//! Test: Success Chain - every step runs, in declared order

use crate::helpers::*;
use ci_runner::core::StepState;
use ci_runner::execution::CommandOutput;

#[tokio::test]
async fn test_success_chain() {
    let yaml = r#"
name: "Test: Success Chain"
on:
  push:
    branches: [main]
steps:
  - id: install
    name: Install dependencies
    run: pipenv install --deploy
  - id: lint
    run: pipenv run lint
  - id: run
    run: pipenv run python main.py HELLO WORLD
"#;

    let executor = MockExecutor::new().with_output("run", CommandOutput::success().with_stdout("HELLO WORLD\n"));
    let (run, runner) = run_with_mock(workflow_from_yaml(yaml), executor).await;

    assert_run_succeeded(&run);
    assert_execution_order(&run, &["install", "lint", "run"]);
    assert_eq!(runner.executor().executed(), vec!["install", "lint", "run"]);
    assert_eq!(run.succeeded_count(), 3);
    assert_eq!(run.progress(), 1.0);

    match &run.step("run").unwrap().state {
        StepState::Succeeded { exit_code, stdout, .. } => {
            assert_eq!(*exit_code, 0);
            assert_eq!(stdout, "HELLO WORLD\n");
        }
        other => panic!("run should have succeeded, but was: {:?}", other),
    }
}

/// Two successful steps run in order and the run succeeds
#[tokio::test]
async fn test_two_steps_in_order() {
    let yaml = r#"
name: pair
on:
  workflow_dispatch:
steps:
  - id: A
    run: "true"
  - id: B
    run: "true"
"#;

    let (run, _) = run_with_mock(workflow_from_yaml(yaml), MockExecutor::new()).await;

    assert_run_succeeded(&run);
    assert_execution_order(&run, &["A", "B"]);
    assert!(run.started_at.is_some());
    assert!(run.completed_at >= run.started_at);
}

#[tokio::test]
async fn test_commands_carry_step_settings() {
    let yaml = r#"
name: settings
on:
  workflow_dispatch:
default_timeout_secs: 90
steps:
  - id: build
    run: make
    shell: bash
    working_directory: app
  - id: publish
    run: git push --force origin gh-pages
    timeout_secs: 300
"#;

    let (_, runner) = run_with_mock(workflow_from_yaml(yaml), MockExecutor::new()).await;
    let executor = runner.executor();

    let build = executor.call_for("build").unwrap();
    assert_eq!(build.program, "bash");
    assert!(build.working_dir.ends_with("app"));
    assert_eq!(build.timeout_secs, 90);

    let publish = executor.call_for("publish").unwrap();
    assert_eq!(publish.script, "git push --force origin gh-pages");
    assert_eq!(publish.timeout_secs, 300);
}
