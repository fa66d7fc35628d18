//! Execution environment - the explicit inputs a run executes against

use crate::core::permissions::Permissions;
use crate::core::step::Step;
use crate::core::trigger::Event;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Everything a run may read from its surroundings
///
/// Nothing is taken from the process implicitly: the process environment is
/// only visible to steps when `inherit_process_env` is set.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Caller-supplied variables (e.g. `--var KEY=VALUE`)
    pub variables: HashMap<String, String>,

    /// Directory steps run in
    pub working_dir: PathBuf,

    /// Whether steps see the runner's own process environment
    pub inherit_process_env: bool,

    /// Permissions granted to runs in this environment
    pub permissions: Permissions,

    /// Variables describing the triggering event
    event_variables: Vec<(String, String)>,
}

impl Environment {
    /// Create an isolated environment rooted at `working_dir`
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    pub fn inheriting_process_env(mut self) -> Self {
        self.inherit_process_env = true;
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_variables<I, K, V>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.variables
            .extend(variables.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Attach the variables describing `event`
    pub fn for_event(mut self, event: &Event) -> Self {
        self.event_variables = event.variables();
        self
    }

    pub fn event_variables(&self) -> &[(String, String)] {
        &self.event_variables
    }

    /// Effective variables for `step`
    ///
    /// Layers, lowest precedence first: process env (when inherited),
    /// workflow env, caller variables, event variables, step env.
    pub fn variables_for(
        &self,
        step: &Step,
        workflow_env: &BTreeMap<String, String>,
    ) -> HashMap<String, String> {
        let mut vars = HashMap::new();

        if self.inherit_process_env {
            vars.extend(std::env::vars());
        }
        vars.extend(workflow_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        vars.extend(self.event_variables.iter().cloned());
        vars.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        vars
    }

    /// Directory the step's command runs in
    pub fn resolve_working_dir(&self, step: &Step) -> PathBuf {
        match &step.working_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.working_dir.join(dir),
            None => self.working_dir.clone(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_layering() {
        let workflow_env: BTreeMap<String, String> = [
            ("PYTHON_VERSION".to_string(), "3.x".to_string()),
            ("LEVEL".to_string(), "workflow".to_string()),
        ]
        .into_iter()
        .collect();

        let env = Environment::new("/work")
            .with_variable("LEVEL", "caller")
            .with_variable("CI_EVENT", "spoofed")
            .for_event(&Event::push_branch("main").with_revision("abc"));

        let step = Step::new("s", "true").with_env("STEP_ONLY", "1");
        let vars = env.variables_for(&step, &workflow_env);

        assert_eq!(vars.get("PYTHON_VERSION"), Some(&"3.x".to_string()));
        assert_eq!(vars.get("LEVEL"), Some(&"caller".to_string()));
        assert_eq!(vars.get("CI_EVENT"), Some(&"push".to_string()));
        assert_eq!(vars.get("CI_SHA"), Some(&"abc".to_string()));
        assert_eq!(vars.get("STEP_ONLY"), Some(&"1".to_string()));

        let overriding = Step::new("s", "true").with_env("LEVEL", "step");
        let vars = env.variables_for(&overriding, &workflow_env);
        assert_eq!(vars.get("LEVEL"), Some(&"step".to_string()));
    }

    #[test]
    fn test_process_env_is_opt_in() {
        let step = Step::new("s", "true");
        let isolated = Environment::new("/work");
        let vars = isolated.variables_for(&step, &BTreeMap::new());
        assert!(vars.is_empty());

        if std::env::var("PATH").is_ok() {
            let inherited = Environment::new("/work").inheriting_process_env();
            let vars = inherited.variables_for(&step, &BTreeMap::new());
            assert!(vars.contains_key("PATH"));
        }
    }

    #[test]
    fn test_resolve_working_dir() {
        let env = Environment::new("/work");
        assert_eq!(env.resolve_working_dir(&Step::new("a", "true")), PathBuf::from("/work"));
        assert_eq!(
            env.resolve_working_dir(&Step::new("b", "true").in_directory("docs")),
            PathBuf::from("/work/docs")
        );
        assert_eq!(
            env.resolve_working_dir(&Step::new("c", "true").in_directory("/tmp")),
            PathBuf::from("/tmp")
        );
    }
}
