//! Repository permission scopes requested by a workflow and granted by an environment

use crate::core::error::RunError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Access level for a permission scope, ordered `none < read < write`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    None,
    Read,
    Write,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermissionLevel::None => "none",
            PermissionLevel::Read => "read",
            PermissionLevel::Write => "write",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(PermissionLevel::None),
            "read" => Ok(PermissionLevel::Read),
            "write" => Ok(PermissionLevel::Write),
            other => Err(format!("unknown permission level: {}", other)),
        }
    }
}

/// Scope -> level map (e.g. `contents: write`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(BTreeMap<String, PermissionLevel>);

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style grant
    pub fn with(mut self, scope: impl Into<String>, level: PermissionLevel) -> Self {
        self.0.insert(scope.into(), level);
        self
    }

    /// Level for a scope; unknown scopes are `none`
    pub fn level(&self, scope: &str) -> PermissionLevel {
        self.0.get(scope).copied().unwrap_or(PermissionLevel::None)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PermissionLevel)> {
        self.0.iter().map(|(scope, level)| (scope.as_str(), *level))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same scopes, with every level lowered to at most `max`
    pub fn capped(&self, max: PermissionLevel) -> Self {
        Self(
            self.0
                .iter()
                .map(|(scope, level)| (scope.clone(), (*level).min(max)))
                .collect(),
        )
    }

    /// Verify that these grants cover every scope in `required`
    pub fn check(&self, required: &Permissions) -> Result<(), RunError> {
        for (scope, level) in required.iter() {
            let granted = self.level(scope);
            if granted < level {
                return Err(RunError::PermissionDenied {
                    scope: scope.to_string(),
                    required: level,
                    granted,
                });
            }
        }
        Ok(())
    }
}
