//! Workflow configuration from YAML

use crate::core::{
    cron::CronSchedule,
    permissions::Permissions,
    trigger::{RefPattern, Trigger, TriggerSet},
    workflow::Workflow,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Events that start a run
    #[serde(rename = "on")]
    pub triggers: TriggerConfig,

    /// Permissions the run requires
    #[serde(default)]
    pub permissions: Permissions,

    /// Variables available to all steps
    #[serde(default)]
    env: BTreeMap<String, Value>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Steps, in execution order
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// The `on:` block
///
/// A key that is present with no value (`workflow_dispatch:`) still enables
/// its trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, deserialize_with = "present")]
    pub push: Option<PushConfig>,

    #[serde(default, deserialize_with = "present")]
    pub pull_request: Option<PullRequestConfig>,

    /// A single `{cron: ...}` map or a list of them
    #[serde(default, deserialize_with = "one_or_many")]
    pub schedule: Vec<ScheduleConfig>,

    #[serde(default, deserialize_with = "present")]
    pub workflow_dispatch: Option<DispatchConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub branches: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullRequestConfig {
    #[serde(default)]
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub cron: String,
}

/// `workflow_dispatch` takes no parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {}

/// Deserialize a key that is present (even as `null`) into `Some`
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?.unwrap_or_default()))
}

/// Deserialize either one value or a list of values into a list
fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::<T>::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Command to run
    pub run: String,

    /// Step-level variables
    #[serde(default)]
    env: BTreeMap<String, Value>,

    /// Variables that must be set before the step starts
    #[serde(default)]
    pub requires: Vec<String>,

    /// Shell for the command (defaults to `sh`)
    #[serde(default)]
    pub shell: Option<String>,

    /// Working directory relative to the run's working dir
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Timeout for this step (overrides the workflow default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl StepConfig {
    /// Step env as strings
    pub fn env_as_string_map(&self) -> BTreeMap<String, String> {
        scalar_map(&self.env)
    }
}

/// Render a YAML scalar the way it would appear in a shell variable
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn scalar_map(values: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    values
        .iter()
        .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
        .collect()
}

fn check_scalars(values: &BTreeMap<String, Value>, owner: &str) -> Result<()> {
    for (key, value) in values {
        if scalar_to_string(value).is_none() {
            anyhow::bail!("{} env variable '{}' must be a string, number or bool", owner, key);
        }
    }
    Ok(())
}

fn patterns(list: &[String], field: &str) -> Result<Vec<RefPattern>> {
    let patterns: Vec<RefPattern> = list.iter().map(|p| RefPattern::new(p)).collect();

    if list.iter().any(|p| p.trim_start_matches('!').is_empty()) {
        anyhow::bail!("{} contains an empty pattern", field);
    }
    if !patterns.is_empty() && patterns.iter().all(RefPattern::is_negated) {
        anyhow::bail!(
            "{} only contains negated patterns, so it can never match",
            field
        );
    }

    Ok(patterns)
}

impl TriggerConfig {
    pub fn is_empty(&self) -> bool {
        self.push.is_none()
            && self.pull_request.is_none()
            && self.schedule.is_empty()
            && self.workflow_dispatch.is_none()
    }

    /// Build the trigger set, in `push`, `pull_request`, `schedule`,
    /// `workflow_dispatch` order
    pub fn to_trigger_set(&self) -> Result<TriggerSet> {
        let mut triggers = Vec::new();

        if let Some(push) = &self.push {
            triggers.push(Trigger::Push {
                branches: patterns(&push.branches, "on.push.branches")?,
                tags: patterns(&push.tags, "on.push.tags")?,
            });
        }
        if let Some(pull_request) = &self.pull_request {
            triggers.push(Trigger::PullRequest {
                branches: patterns(&pull_request.branches, "on.pull_request.branches")?,
            });
        }
        for schedule in &self.schedule {
            let cron = CronSchedule::parse(&schedule.cron)
                .with_context(|| format!("Invalid schedule '{}'", schedule.cron))?;
            triggers.push(Trigger::Schedule(cron));
        }
        if self.workflow_dispatch.is_some() {
            triggers.push(Trigger::ManualDispatch);
        }

        Ok(TriggerSet::new(triggers))
    }
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid workflow file {}", path.display()))
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Workflow name must not be empty");
        }

        if self.triggers.is_empty() {
            anyhow::bail!("Workflow '{}' declares no triggers", self.name);
        }
        // Builds every pattern and cron expression
        self.triggers.to_trigger_set()?;

        if self.steps.is_empty() {
            anyhow::bail!("Workflow '{}' has no steps", self.name);
        }

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("default_timeout_secs must be greater than zero");
        }

        check_scalars(&self.env, "Workflow")?;

        // Check that all step IDs are unique
        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                anyhow::bail!("Step ID must not be empty");
            }
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
            if step.run.trim().is_empty() {
                anyhow::bail!("Step '{}' has an empty command", step.id);
            }
            if step.requires.iter().any(|name| name.trim().is_empty()) {
                anyhow::bail!("Step '{}' requires an empty variable name", step.id);
            }
            if step.timeout_secs == Some(0) {
                anyhow::bail!("Step '{}' timeout must be greater than zero", step.id);
            }
            check_scalars(&step.env, &format!("Step '{}'", step.id))?;
        }

        Ok(())
    }

    /// Workflow env as strings
    pub fn env_as_string_map(&self) -> BTreeMap<String, String> {
        scalar_map(&self.env)
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}
