//! CLI output formatting

use crate::{
    core::{RunStatus, StepState},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    let label = state.label().to_uppercase();
    match state {
        StepState::Pending => style(label).dim().to_string(),
        StepState::Running { .. } => style(label).yellow().to_string(),
        StepState::Succeeded { .. } => style(label).green().to_string(),
        StepState::Failed { .. } => style(label).red().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };

    let mut line = format!(
        "{} {} - {} - {} ({}/{}) - {}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow_name).bold(),
        format_status(summary.status),
        summary.succeeded_steps,
        summary.total_steps,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    );
    if let Some(step) = &summary.failed_step {
        line.push_str(&format!(" - failed at {}", style(step).red()));
    }
    line
}

/// Header for the history listing, counting the runs actually shown
pub fn format_history_header(shown: usize) -> String {
    format!("{} Run history (showing latest {}):", INFO, shown)
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            workflow_name,
            trigger,
            total_steps,
        } => format!(
            "{} Starting {} ({}, {} steps){}",
            ROCKET,
            style(workflow_name).bold(),
            style(short_id(run_id)).dim(),
            total_steps,
            trigger
                .as_ref()
                .map(|t| format!(" on {}", style(t).cyan()))
                .unwrap_or_default()
        ),
        ExecutionEvent::StepStarted {
            step_id,
            name,
            index,
            total,
        } => {
            let label = if name == step_id {
                style(step_id).cyan().to_string()
            } else {
                format!("{} {}", style(name).cyan(), style(format!("({})", step_id)).dim())
            };
            format!("{} [{}/{}] {}", SPINNER, index + 1, total, label)
        }
        // Header only, the body goes through `format_output`
        ExecutionEvent::StepOutput { step_id, .. } => {
            format!("{} Output from {}:", INFO, style(step_id).dim())
        }
        ExecutionEvent::StepSucceeded { step_id, duration } => format!(
            "{} {} {}",
            CHECK,
            style(step_id).green(),
            style(format_duration(duration.to_std().unwrap_or_default())).dim()
        ),
        ExecutionEvent::StepFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped { step_id } => {
            format!("{} {} {}", SKIP, style(step_id).dim(), style("(skipped)").dim())
        }
        ExecutionEvent::RunCompleted { run_id, status } => {
            let status_str = match status {
                RunStatus::Succeeded => format!("{} completed", style("successfully").green()),
                RunStatus::Failed => style("failed").red().to_string(),
                other => other.to_string(),
            };
            format!("{} Run ({}) {}", INFO, style(short_id(run_id)).dim(), status_str)
        }
    }
}

/// Format step output, keeping at most `max_lines` lines cut to the
/// terminal width
pub fn format_output(output: &str, max_lines: usize) -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(120)
        .max(20);

    let lines: Vec<String> = output
        .lines()
        .map(|line| {
            if line.chars().count() > width {
                let cut: String = line.chars().take(width - 1).collect();
                format!("{}…", cut)
            } else {
                line.to_string()
            }
        })
        .collect();

    if lines.len() <= max_lines {
        lines.join("\n")
    } else {
        format!(
            "{}\n{}... ({} more lines)",
            lines[..max_lines].join("\n"),
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
