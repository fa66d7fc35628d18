use anyhow::{Context, Result};
use ci_runner::cli::commands::{
    EvaluateCommand, HistoryCommand, ListCommand, RunCommand, ValidateCommand, WatchCommand,
};
use ci_runner::cli::output::*;
use ci_runner::cli::{Cli, Command};
use ci_runner::core::config::WorkflowConfig;
use ci_runner::core::{Environment, PermissionLevel, RunStatus, Workflow};
use ci_runner::execution::{
    Dispatch, ExecutionEvent, PipelineRunner, ScheduleWatcher, ShellExecutor,
};
use ci_runner::persistence::{RunArchive, RunSummary};
use ci_runner::PipelineRun;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.stream).await?,
        Command::Evaluate(cmd) => evaluate_workflow(cmd)?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::Watch(cmd) => watch_workflow(cmd, cli.stream).await?,
        Command::History(cmd) => show_history(cmd).await?,
        Command::List(cmd) => list_workflows(cmd).await?,
    }

    Ok(())
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let config = WorkflowConfig::from_file(file).context("Failed to load workflow config")?;
    let workflow = config.to_workflow()?;
    println!("{} Loaded workflow: {}", INFO, style(&workflow.name).bold());
    Ok(workflow)
}

fn build_environment(
    workflow: &Workflow,
    workdir: Option<&PathBuf>,
    vars: &[(String, String)],
    read_only: bool,
) -> Result<Environment> {
    let working_dir = match workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };

    for (key, value) in vars {
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let permissions = if read_only {
        workflow.permissions.capped(PermissionLevel::Read)
    } else {
        workflow.permissions.clone()
    };

    Ok(Environment::new(working_dir)
        .inheriting_process_env()
        .with_variables(vars.iter().cloned())
        .with_permissions(permissions))
}

async fn open_archive(no_history: bool) -> Option<Arc<dyn RunArchive>> {
    if no_history {
        return None;
    }
    match open_store().await {
        Ok(store) => {
            let archive: Arc<dyn RunArchive> = Arc::new(store);
            Some(archive)
        }
        Err(e) => {
            warn!("Run history disabled: {:#}", e);
            None
        }
    }
}

#[cfg(feature = "sqlite")]
async fn open_store() -> Result<ci_runner::persistence::SqliteRunStore> {
    ci_runner::persistence::SqliteRunStore::with_default_path().await
}

#[cfg(not(feature = "sqlite"))]
async fn open_store() -> Result<ci_runner::persistence::InMemoryArchive> {
    anyhow::bail!("ci-runner was built without the sqlite feature")
}

fn build_runner(
    workflow: Workflow,
    stream: bool,
    archive: Option<Arc<dyn RunArchive>>,
) -> PipelineRunner<ShellExecutor> {
    let progress = create_progress_bar(workflow.steps.len());
    let mut runner = PipelineRunner::new(workflow, ShellExecutor::new());
    if let Some(archive) = archive {
        runner = runner.with_archive(archive);
    }

    runner.add_event_handler(move |event| {
        match event {
            ExecutionEvent::RunStarted { .. } => progress.reset(),
            ExecutionEvent::StepStarted { step_id, .. } => progress.set_message(step_id.clone()),
            ExecutionEvent::StepSucceeded { .. } => progress.inc(1),
            ExecutionEvent::RunCompleted { .. } => progress.finish_and_clear(),
            ExecutionEvent::StepOutput { stdout, stderr, .. } => {
                // Output is only printed when streaming
                if stream {
                    progress.println(format_execution_event(event));
                    if !stdout.is_empty() {
                        progress.println(format_output(stdout, 20));
                    }
                    if !stderr.is_empty() {
                        progress.println(style(format_output(stderr, 20)).yellow().to_string());
                    }
                }
                return;
            }
            _ => {}
        }
        progress.println(format_execution_event(event));
    });

    runner
}

fn print_run_result(run: &PipelineRun) {
    println!();
    for result in &run.steps {
        println!(
            "  {} {}",
            format_step_state(&result.state),
            style(&result.name).bold()
        );
    }
    if let Some(duration) = run.duration().and_then(|d| d.to_std().ok()) {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    match run.result() {
        Ok(()) => println!(
            "\n{} {} completed {}",
            CHECK,
            style(&run.workflow_name).bold(),
            style("successfully").green()
        ),
        Err(e) => {
            println!(
                "\n{} {} {}",
                CROSS,
                style(&run.workflow_name).bold(),
                style("failed").red()
            );
            error!("{}", e);
        }
    }
}

async fn run_workflow(cmd: &RunCommand, stream: bool) -> Result<()> {
    let workflow = load_workflow(&cmd.file)?;
    let event = cmd.event.to_event()?;
    let environment = build_environment(&workflow, cmd.workdir.as_ref(), &cmd.var, cmd.read_only)?;
    let archive = open_archive(cmd.no_history).await;
    let runner = build_runner(workflow, stream, archive);

    println!();
    let outcome = if cmd.force {
        runner
            .force_dispatch(&event, &environment)
            .await
            .map(Dispatch::Completed)
    } else {
        runner.dispatch(&event, &environment).await
    };

    match outcome {
        Ok(Dispatch::NotTriggered) => {
            println!(
                "{} {} is not triggered by {}",
                INFO,
                style(&runner.workflow().name).bold(),
                style(&event).cyan()
            );
            Ok(())
        }
        Ok(Dispatch::Completed(run)) => {
            print_run_result(&run);
            if !run.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", CROSS, style(&e).red());
            std::process::exit(1);
        }
    }
}

fn evaluate_workflow(cmd: &EvaluateCommand) -> Result<()> {
    let config = WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow config")?;
    let workflow = config.to_workflow()?;
    let event = cmd.event.to_event()?;
    let matched = workflow.triggers.matching(&event).map(|t| t.to_string());

    if cmd.json {
        let data = serde_json::json!({
            "workflow": workflow.name,
            "event": event.to_string(),
            "triggered": matched.is_some(),
            "trigger": matched,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        match &matched {
            Some(trigger) => println!(
                "{} {} would run for {} (trigger: {})",
                CHECK,
                style(&workflow.name).bold(),
                style(&event).cyan(),
                style(trigger).green()
            ),
            None => println!(
                "{} {} would not run for {}",
                CROSS,
                style(&workflow.name).bold(),
                style(&event).cyan()
            ),
        }
    }

    if matched.is_none() {
        std::process::exit(2);
    }
    Ok(())
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    match WorkflowConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Workflow configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            if let Ok(triggers) = config.triggers.to_trigger_set() {
                for trigger in triggers.iter() {
                    println!("  Trigger: {}", style(trigger).cyan());
                }
            }
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Variables: {}", style(config.env_as_string_map().len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn watch_workflow(cmd: &WatchCommand, stream: bool) -> Result<()> {
    let workflow = load_workflow(&cmd.file)?;
    let watcher = ScheduleWatcher::for_workflow(&workflow)
        .with_context(|| format!("Workflow {} has no schedule triggers", workflow.name))?;
    let environment = build_environment(&workflow, cmd.workdir.as_ref(), &cmd.var, cmd.read_only)?;
    let archive = open_archive(cmd.no_history).await;
    let runner = build_runner(workflow, stream, archive);

    println!("{} Watching schedule (Ctrl-C to stop)", SPINNER);

    loop {
        tokio::select! {
            result = watcher.wait_and_dispatch(&runner, &environment) => {
                match result {
                    Ok(Some(Dispatch::Completed(run))) => print_run_result(&run),
                    Ok(Some(Dispatch::NotTriggered)) => {}
                    Ok(None) => {
                        println!("{} No further scheduled runs", INFO);
                        break;
                    }
                    // A held lock skips this firing, the next one may still run
                    Err(e) => println!("{} {}", WARN, style(&e).yellow()),
                }
                if cmd.once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Stopping watcher", INFO);
                break;
            }
        }
    }

    Ok(())
}

async fn list_workflows(cmd: &ListCommand) -> Result<()> {
    let store = open_store().await?;
    let workflows = store.list_workflows().await?;

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(());
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for workflow in &workflows {
            let runs = store.list_runs(workflow).await?;
            json_data.push(serde_json::json!({
                "name": workflow,
                "run_count": runs.len(),
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Workflows in history:", INFO);
    for workflow in &workflows {
        if cmd.with_counts {
            let runs = store.list_runs(workflow).await?;
            let succeeded = runs.iter().filter(|r| r.status == RunStatus::Succeeded).count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(workflow).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(workflow).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Some(summary) => print_run_details(&summary, cmd.details)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let runs = match &cmd.workflow {
        Some(workflow) => {
            let mut runs = store.list_runs(workflow).await?;
            runs.truncate(cmd.limit);
            runs
        }
        None => store.recent_runs(cmd.limit).await?,
    };

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{}", format_history_header(runs.len()));
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
        if cmd.details {
            if let Some(error) = &summary.error {
                println!("    {}", style(error).red());
            }
        }
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary, details: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow_name).bold());
    if let Some(trigger) = &summary.trigger {
        println!("  Trigger: {}", style(trigger).cyan());
    }
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
    }
    if let Some(duration) = summary.duration().and_then(|d| d.to_std().ok()) {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    println!(
        "  Steps: {}/{} succeeded",
        summary.succeeded_steps, summary.total_steps
    );
    if let Some(step) = &summary.failed_step {
        println!("  Failed step: {}", style(step).red());
    }

    if details {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
