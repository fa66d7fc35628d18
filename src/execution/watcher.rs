//! Schedule watcher - turns cron triggers into schedule events

use crate::{
    core::{Environment, Event, RunError, TriggerSet, Workflow},
    execution::{
        engine::{Dispatch, PipelineRunner},
        executor::CommandExecutor,
    },
};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

/// Sleeps until a workflow's next cron firing and dispatches it
#[derive(Debug, Clone)]
pub struct ScheduleWatcher {
    triggers: TriggerSet,
}

impl ScheduleWatcher {
    /// Watcher for `workflow`, or `None` if it has no schedule triggers
    pub fn for_workflow(workflow: &Workflow) -> Option<Self> {
        if workflow.triggers.schedules().next().is_none() {
            return None;
        }
        Some(Self {
            triggers: workflow.triggers.clone(),
        })
    }

    /// Next firing strictly after `after`
    pub fn next_fire(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.triggers.next_scheduled(after)
    }

    /// Time left until `at`, zero if it already passed
    pub fn delay_until(now: &DateTime<Utc>, at: &DateTime<Utc>) -> Duration {
        (*at - *now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Wait for the next firing, then dispatch a schedule event for it
    ///
    /// Returns `Ok(None)` when no schedule will ever fire again.
    pub async fn wait_and_dispatch<E: CommandExecutor>(
        &self,
        runner: &PipelineRunner<E>,
        environment: &Environment,
    ) -> Result<Option<Dispatch>, RunError> {
        let now = Utc::now();
        let Some(fire_at) = self.next_fire(&now) else {
            return Ok(None);
        };

        info!(
            "Next scheduled run of {} at {}",
            runner.workflow().name,
            fire_at.to_rfc3339()
        );
        tokio::time::sleep(Self::delay_until(&now, &fire_at)).await;

        runner
            .dispatch(&Event::schedule(fire_at), environment)
            .await
            .map(Some)
    }
}
