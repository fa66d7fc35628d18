//! Trigger evaluation - decides whether an incoming event starts a run

use crate::core::cron::CronSchedule;
use chrono::{DateTime, Utc};
use glob_match::glob_match;
use std::fmt;

/// A branch or tag name pattern
///
/// Uses glob syntax (`*` stops at `/`, `**` crosses it). A leading `!`
/// negates the pattern. The bare pattern `*` matches every name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefPattern {
    pattern: String,
    negated: bool,
}

impl RefPattern {
    pub fn new(pattern: &str) -> Self {
        match pattern.strip_prefix('!') {
            Some(rest) => Self {
                pattern: rest.to_string(),
                negated: true,
            },
            None => Self {
                pattern: pattern.to_string(),
                negated: false,
            },
        }
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    fn matches_name(&self, name: &str) -> bool {
        self.pattern == "*" || glob_match(&self.pattern, name)
    }
}

impl fmt::Display for RefPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.pattern)
        } else {
            f.write_str(&self.pattern)
        }
    }
}

/// Evaluate patterns in order; the last one that matches decides
fn ref_allowed(patterns: &[RefPattern], name: &str) -> bool {
    patterns.iter().fold(false, |allowed, pattern| {
        if pattern.matches_name(name) {
            !pattern.negated
        } else {
            allowed
        }
    })
}

/// A pushed git ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Branch(String),
    Tag(String),
}

impl GitRef {
    /// Parse `refs/heads/x`, `refs/tags/x`, or a bare branch name
    pub fn parse(s: &str) -> Self {
        if let Some(tag) = s.strip_prefix("refs/tags/") {
            GitRef::Tag(tag.to_string())
        } else if let Some(branch) = s.strip_prefix("refs/heads/") {
            GitRef::Branch(branch.to_string())
        } else {
            GitRef::Branch(s.to_string())
        }
    }

    /// Short name without the `refs/...` prefix
    pub fn name(&self) -> &str {
        match self {
            GitRef::Branch(name) | GitRef::Tag(name) => name,
        }
    }

    pub fn full_name(&self) -> String {
        match self {
            GitRef::Branch(name) => format!("refs/heads/{}", name),
            GitRef::Tag(name) => format!("refs/tags/{}", name),
        }
    }
}

/// An incoming event that may start a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Push {
        git_ref: GitRef,
        revision: Option<String>,
    },
    PullRequest {
        base_branch: String,
        revision: Option<String>,
    },
    Schedule {
        at: DateTime<Utc>,
    },
    ManualDispatch {
        revision: Option<String>,
    },
}

impl Event {
    pub fn push_branch(branch: &str) -> Self {
        Event::Push {
            git_ref: GitRef::Branch(branch.to_string()),
            revision: None,
        }
    }

    pub fn push_tag(tag: &str) -> Self {
        Event::Push {
            git_ref: GitRef::Tag(tag.to_string()),
            revision: None,
        }
    }

    pub fn pull_request(base_branch: &str) -> Self {
        Event::PullRequest {
            base_branch: base_branch.to_string(),
            revision: None,
        }
    }

    pub fn schedule(at: DateTime<Utc>) -> Self {
        Event::Schedule { at }
    }

    pub fn manual() -> Self {
        Event::ManualDispatch { revision: None }
    }

    /// Attach the revision the run should check out
    pub fn with_revision(mut self, sha: impl Into<String>) -> Self {
        let sha = Some(sha.into());
        match &mut self {
            Event::Push { revision, .. }
            | Event::PullRequest { revision, .. }
            | Event::ManualDispatch { revision } => *revision = sha,
            Event::Schedule { .. } => {}
        }
        self
    }

    /// Event name as used in workflow files
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Push { .. } => "push",
            Event::PullRequest { .. } => "pull_request",
            Event::Schedule { .. } => "schedule",
            Event::ManualDispatch { .. } => "workflow_dispatch",
        }
    }

    /// Variables describing the event, exposed to every step
    pub fn variables(&self) -> Vec<(String, String)> {
        let mut vars = vec![("CI_EVENT".to_string(), self.kind().to_string())];

        let (git_ref, revision) = match self {
            Event::Push { git_ref, revision } => (Some(git_ref.clone()), revision.as_ref()),
            Event::PullRequest {
                base_branch,
                revision,
            } => (Some(GitRef::Branch(base_branch.clone())), revision.as_ref()),
            Event::ManualDispatch { revision } => (None, revision.as_ref()),
            Event::Schedule { at } => {
                vars.push(("CI_SCHEDULED_AT".to_string(), at.to_rfc3339()));
                (None, None)
            }
        };

        if let Some(git_ref) = git_ref {
            vars.push(("CI_REF".to_string(), git_ref.full_name()));
            vars.push(("CI_REF_NAME".to_string(), git_ref.name().to_string()));
        }
        if let Some(sha) = revision {
            vars.push(("CI_SHA".to_string(), sha.clone()));
        }

        vars
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Push {
                git_ref: GitRef::Branch(name),
                ..
            } => write!(f, "push to branch {}", name),
            Event::Push {
                git_ref: GitRef::Tag(name),
                ..
            } => write!(f, "push of tag {}", name),
            Event::PullRequest { base_branch, .. } => {
                write!(f, "pull request into {}", base_branch)
            }
            Event::Schedule { at } => write!(f, "schedule at {}", at.to_rfc3339()),
            Event::ManualDispatch { .. } => f.write_str("manual dispatch"),
        }
    }
}

/// One condition under which a run starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Empty pattern lists match every push. With only one list set, the
    /// other kind of ref never matches.
    Push {
        branches: Vec<RefPattern>,
        tags: Vec<RefPattern>,
    },
    /// Matches against the pull request's base branch
    PullRequest { branches: Vec<RefPattern> },
    Schedule(CronSchedule),
    ManualDispatch,
}

impl Trigger {
    pub fn matches(&self, event: &Event) -> bool {
        match (self, event) {
            (Trigger::Push { branches, tags }, Event::Push { git_ref, .. }) => {
                if branches.is_empty() && tags.is_empty() {
                    return true;
                }
                match git_ref {
                    GitRef::Branch(name) => ref_allowed(branches, name),
                    GitRef::Tag(name) => ref_allowed(tags, name),
                }
            }
            (Trigger::PullRequest { branches }, Event::PullRequest { base_branch, .. }) => {
                branches.is_empty() || ref_allowed(branches, base_branch)
            }
            (Trigger::Schedule(schedule), Event::Schedule { at }) => schedule.matches(at),
            (Trigger::ManualDispatch, Event::ManualDispatch { .. }) => true,
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Push { .. } => "push",
            Trigger::PullRequest { .. } => "pull_request",
            Trigger::Schedule(_) => "schedule",
            Trigger::ManualDispatch => "workflow_dispatch",
        }
    }
}

fn join_patterns(patterns: &[RefPattern]) -> String {
    patterns
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Push { branches, tags } => {
                let mut filters = Vec::new();
                if !branches.is_empty() {
                    filters.push(format!("branches: {}", join_patterns(branches)));
                }
                if !tags.is_empty() {
                    filters.push(format!("tags: {}", join_patterns(tags)));
                }
                if filters.is_empty() {
                    f.write_str("push")
                } else {
                    write!(f, "push ({})", filters.join("; "))
                }
            }
            Trigger::PullRequest { branches } if branches.is_empty() => f.write_str("pull_request"),
            Trigger::PullRequest { branches } => {
                write!(f, "pull_request (branches: {})", join_patterns(branches))
            }
            Trigger::Schedule(schedule) => write!(f, "schedule ({})", schedule),
            Trigger::ManualDispatch => f.write_str("workflow_dispatch"),
        }
    }
}

/// The immutable set of triggers of a workflow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    triggers: Vec<Trigger>,
}

impl TriggerSet {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Self { triggers }
    }

    /// True if any trigger matches the event. Pure and idempotent.
    pub fn evaluate(&self, event: &Event) -> bool {
        self.matching(event).is_some()
    }

    /// First trigger that matches the event
    pub fn matching(&self, event: &Event) -> Option<&Trigger> {
        self.triggers.iter().find(|trigger| trigger.matches(event))
    }

    pub fn schedules(&self) -> impl Iterator<Item = &CronSchedule> {
        self.triggers.iter().filter_map(|trigger| match trigger {
            Trigger::Schedule(schedule) => Some(schedule),
            _ => None,
        })
    }

    /// Earliest schedule firing strictly after `after`
    pub fn next_scheduled(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedules()
            .filter_map(|schedule| schedule.next_after(after))
            .min()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}
