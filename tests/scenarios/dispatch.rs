//! Test: Dispatch - evaluate, lock, permission check, run and archive

use crate::helpers::*;
use ci_runner::core::{Environment, Event, PermissionLevel, Permissions, RunError, RunStatus};
use ci_runner::execution::{Dispatch, PipelineRunner, RunLock};
use ci_runner::persistence::{InMemoryArchive, RunArchive};
use std::sync::Arc;

const PUBLISH: &str = r#"
name: publish
on:
  push:
    branches: [main]
permissions:
  contents: write
env:
  PYTHON_VERSION: "3.x"
  TARGET: workflow
steps:
  - id: setup
    name: Set up Python ${{ env.PYTHON_VERSION }}
    run: echo "python ${{ env.PYTHON_VERSION }} for ${{ env.TARGET }}"
    requires: [PYTHON_VERSION]
  - id: publish
    run: git push --force origin gh-pages
    env:
      TARGET: step
"#;

fn write_access() -> Permissions {
    Permissions::new().with("contents", PermissionLevel::Write)
}

#[tokio::test]
async fn test_dispatch_runs_and_archives() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(InMemoryArchive::new());
    let runner = PipelineRunner::new(workflow_from_yaml(PUBLISH), MockExecutor::new())
        .with_archive(archive.clone());
    let environment = Environment::new(dir.path()).with_permissions(write_access());

    let dispatch = runner
        .dispatch(&Event::push_branch("main"), &environment)
        .await
        .unwrap();

    let run = dispatch.into_run().expect("push to main should start a run");
    assert_run_succeeded(&run);
    assert_execution_order(&run, &["setup", "publish"]);
    assert_eq!(run.trigger.as_deref(), Some("push (branches: main)"));

    let archived = archive.load_run(run.run_id).await.unwrap().unwrap();
    assert_eq!(archived.status, RunStatus::Succeeded);
    assert_eq!(archived.total_steps, 2);
    assert_eq!(archived.succeeded_steps, 2);
    assert_eq!(archive.list_workflows().await.unwrap(), vec!["publish"]);

    // Lock is released once the run finishes
    assert!(!RunLock::path_for(dir.path()).exists());
}

#[tokio::test]
async fn test_not_triggered_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(InMemoryArchive::new());
    let runner = PipelineRunner::new(workflow_from_yaml(PUBLISH), MockExecutor::new())
        .with_archive(archive.clone());
    let environment = Environment::new(dir.path()).with_permissions(write_access());

    for event in [Event::push_branch("develop"), Event::pull_request("main"), Event::manual()] {
        let dispatch = runner.dispatch(&event, &environment).await.unwrap();
        assert!(matches!(dispatch, Dispatch::NotTriggered), "{} should not trigger", event);
    }

    assert!(runner.executor().calls().is_empty());
    assert!(archive.recent_runs(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_force_dispatch_skips_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(workflow_from_yaml(PUBLISH), MockExecutor::new());
    let environment = Environment::new(dir.path()).with_permissions(write_access());

    let run = runner
        .force_dispatch(&Event::manual(), &environment)
        .await
        .unwrap();

    assert_run_succeeded(&run);
    assert_eq!(run.trigger.as_deref(), Some("forced workflow_dispatch"));
    assert_eq!(runner.executor().executed(), vec!["setup", "publish"]);
}

#[tokio::test]
async fn test_held_lock_refuses_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(workflow_from_yaml(PUBLISH), MockExecutor::new());
    let environment = Environment::new(dir.path()).with_permissions(write_access());

    let held = RunLock::acquire(dir.path(), "publish").unwrap();
    let result = runner
        .dispatch(&Event::push_branch("main"), &environment)
        .await;

    assert!(matches!(result, Err(RunError::AlreadyRunning { .. })));
    assert!(runner.executor().calls().is_empty());

    drop(held);
    let dispatch = runner
        .dispatch(&Event::push_branch("main"), &environment)
        .await
        .unwrap();
    assert!(dispatch.run().unwrap().is_success());
}

#[tokio::test]
async fn test_insufficient_permissions_create_no_run() {
    let dir = tempfile::tempdir().unwrap();
    let archive = Arc::new(InMemoryArchive::new());
    let runner = PipelineRunner::new(workflow_from_yaml(PUBLISH), MockExecutor::new())
        .with_archive(archive.clone());
    let environment = Environment::new(dir.path())
        .with_permissions(write_access().capped(PermissionLevel::Read));

    let result = runner
        .dispatch(&Event::push_branch("main"), &environment)
        .await;

    assert_eq!(
        result.unwrap_err(),
        RunError::PermissionDenied {
            scope: "contents".to_string(),
            required: PermissionLevel::Write,
            granted: PermissionLevel::Read,
        }
    );
    assert!(runner.executor().calls().is_empty());
    assert!(archive.recent_runs(10).await.unwrap().is_empty());
    assert!(!RunLock::path_for(dir.path()).exists());
}

#[tokio::test]
async fn test_missing_input_is_never_spawned() {
    let yaml = r#"
name: deploy
on:
  workflow_dispatch:
steps:
  - id: build
    run: make
  - id: upload
    run: upload --token "$DEPLOY_TOKEN"
    requires: [DEPLOY_TOKEN]
  - id: notify
    run: notify
"#;
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(workflow_from_yaml(yaml), MockExecutor::new());

    let run = runner
        .dispatch(&Event::manual(), &Environment::new(dir.path()))
        .await
        .unwrap()
        .into_run()
        .unwrap();

    assert_run_failed(&run);
    assert_eq!(
        run.failure,
        Some(RunError::MissingInput {
            step: "upload".to_string(),
            name: "DEPLOY_TOKEN".to_string(),
        })
    );
    assert_step_failed(&run, "upload", "DEPLOY_TOKEN");
    assert_step_pending(&run, "notify");
    assert_eq!(runner.executor().executed(), vec!["build"]);

    // Supplying the input lets the step run
    let environment = Environment::new(dir.path()).with_variable("DEPLOY_TOKEN", "s3cr3t");
    let run = runner.run(&runner.workflow().steps, &environment).await;
    assert_run_succeeded(&run);
}

#[tokio::test]
async fn test_variables_are_layered_and_rendered() {
    let dir = tempfile::tempdir().unwrap();
    let runner = PipelineRunner::new(workflow_from_yaml(PUBLISH), MockExecutor::new());
    let environment = Environment::new(dir.path())
        .with_permissions(write_access())
        .with_variable("PYTHON_VERSION", "3.12")
        .with_variable("CI_EVENT", "overridden");

    runner
        .dispatch(
            &Event::push_branch("main").with_revision("4f2a9c1"),
            &environment,
        )
        .await
        .unwrap();

    let executor = runner.executor();
    let setup = executor.call_for("setup").unwrap();
    // Caller variables override workflow env
    assert_eq!(setup.script, r#"echo "python 3.12 for workflow""#);
    assert_eq!(setup.variables.get("PYTHON_VERSION").unwrap(), "3.12");
    // Event variables override caller variables
    assert_eq!(setup.variables.get("CI_EVENT").unwrap(), "push");
    assert_eq!(setup.variables.get("CI_REF").unwrap(), "refs/heads/main");
    assert_eq!(setup.variables.get("CI_REF_NAME").unwrap(), "main");
    assert_eq!(setup.variables.get("CI_SHA").unwrap(), "4f2a9c1");
    // Process env is not inherited unless asked for
    assert!(!setup.variables.contains_key("PATH"));

    // Step env wins over everything
    let publish = executor.call_for("publish").unwrap();
    assert_eq!(publish.variables.get("TARGET").unwrap(), "step");
    assert_eq!(publish.working_dir, dir.path());
}
