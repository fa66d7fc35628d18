//! Workflow domain model

use crate::core::{
    config::WorkflowConfig,
    permissions::Permissions,
    step::{Step, StepDefaults},
    trigger::{Event, TriggerSet},
};
use anyhow::Result;
use std::collections::BTreeMap;

/// An immutable workflow definition: when to run, and what to run
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Events that start a run
    pub triggers: TriggerSet,

    /// Permissions a run requires
    pub permissions: Permissions,

    /// Variables available to all steps
    pub env: BTreeMap<String, String>,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, triggers: TriggerSet, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            triggers,
            permissions: Permissions::new(),
            env: BTreeMap::new(),
            steps,
        }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        let defaults = StepDefaults {
            timeout_secs: config
                .default_timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
            ..StepDefaults::default()
        };

        Ok(Workflow {
            name: config.name.clone(),
            triggers: config.triggers.to_trigger_set()?,
            permissions: config.permissions.clone(),
            env: config.env_as_string_map(),
            steps: config
                .steps
                .iter()
                .map(|step_config| Step::from_config(step_config, &defaults))
                .collect(),
        })
    }

    /// True if the event matches any of the workflow's triggers
    pub fn evaluate(&self, event: &Event) -> bool {
        self.triggers.evaluate(event)
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }
}
