//! Step domain model

use crate::core::config::StepConfig;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::OnceLock;

/// A single step in a workflow
///
/// Steps are opaque shell commands. Their order in the workflow is their
/// execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Command passed to the shell, may contain `${{ env.NAME }}` expressions
    pub command: String,

    /// Step-level variables (highest precedence)
    pub env: BTreeMap<String, String>,

    /// Variables that must be set and non-empty before the step may start
    pub requires: Vec<String>,

    /// Shell used to run the command (`<shell> -e -c <command>`)
    pub shell: String,

    /// Working directory, relative to the environment's working dir
    pub working_directory: Option<PathBuf>,

    /// Timeout in seconds
    pub timeout_secs: u64,
}

impl Step {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        let id = id.into();
        let defaults = StepDefaults::default();
        Step {
            name: id.clone(),
            id,
            command: command.into(),
            env: BTreeMap::new(),
            requires: Vec::new(),
            shell: defaults.shell,
            working_directory: None,
            timeout_secs: defaults.timeout_secs,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn requiring(mut self, name: impl Into<String>) -> Self {
        self.requires.push(name.into());
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn in_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        Step {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            command: config.run.clone(),
            env: config.env_as_string_map(),
            requires: config.requires.clone(),
            shell: config.shell.clone().unwrap_or_else(|| defaults.shell.clone()),
            working_directory: config.working_directory.as_ref().map(PathBuf::from),
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }

    /// Required inputs that are unset or empty in `variables`
    pub fn missing_inputs<'a>(&'a self, variables: &HashMap<String, String>) -> Vec<&'a str> {
        self.requires
            .iter()
            .filter(|name| variables.get(name.as_str()).map_or(true, |v| v.is_empty()))
            .map(String::as_str)
            .collect()
    }

    /// Expand `${{ env.NAME }}` expressions; unknown names expand to nothing
    pub fn render_command(&self, variables: &HashMap<String, String>) -> String {
        static EXPRESSION: OnceLock<Regex> = OnceLock::new();
        let expression = EXPRESSION.get_or_init(|| {
            Regex::new(r"\$\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
                .expect("static expression pattern is valid")
        });

        expression
            .replace_all(&self.command, |caps: &Captures| {
                variables.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub shell: String,
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout_secs: 3600, // 1 hour
        }
    }
}
