//! Trigger rules and branch filters

use globset::{GlobBuilder, GlobMatcher};
use serde::{Serialize, Serializer};
use std::fmt;

/// Repository event that starts a workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    PullRequest,
    /// Any other event name (`schedule`, `workflow_dispatch`, ...), kept verbatim
    Other(String),
}

impl EventKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "push" => EventKind::Push,
            "pull_request" => EventKind::PullRequest,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Other(name) => name,
        }
    }

    /// Only push and pull_request carry branch filters
    pub fn supports_branch_filter(&self) -> bool {
        matches!(self, EventKind::Push | EventKind::PullRequest)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A compiled branch-name pattern. A leading `!` negates it.
#[derive(Debug, Clone)]
pub struct BranchPattern {
    raw: String,
    negated: bool,
    matcher: GlobMatcher,
}

impl BranchPattern {
    /// Compile a pattern. `*` stops at `/`, `**` crosses it.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let (negated, body) = match raw.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if body.trim().is_empty() {
            return Err("pattern is empty".to_string());
        }
        if body != body.trim() {
            return Err("pattern has leading or trailing whitespace".to_string());
        }

        let glob = GlobBuilder::new(body)
            .literal_separator(true)
            .build()
            .map_err(|e| e.kind().to_string())?;

        Ok(Self {
            raw: raw.to_string(),
            negated,
            matcher: glob.compile_matcher(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    fn hits(&self, branch: &str) -> bool {
        self.matcher.is_match(branch)
    }
}

impl PartialEq for BranchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Serialize for BranchPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// One trigger event with its branch patterns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerRule {
    pub event: EventKind,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchPattern>,

    #[serde(rename = "branches-ignore", skip_serializing_if = "Vec::is_empty")]
    pub branches_ignore: Vec<BranchPattern>,
}

impl TriggerRule {
    pub fn new(event: EventKind) -> Self {
        Self {
            event,
            branches: Vec::new(),
            branches_ignore: Vec::new(),
        }
    }

    /// Whether an event of this kind on `branch` fires the rule.
    ///
    /// Patterns are applied in order and the last match wins, so a
    /// negated pattern after a positive one carves out an exception.
    pub fn fires_on(&self, event: &EventKind, branch: &str) -> bool {
        if &self.event != event {
            return false;
        }

        if !self.branches.is_empty() {
            let mut included = false;
            for pattern in &self.branches {
                if pattern.hits(branch) {
                    included = !pattern.is_negated();
                }
            }
            return included;
        }

        if !self.branches_ignore.is_empty() {
            let mut ignored = false;
            for pattern in &self.branches_ignore {
                if pattern.hits(branch) {
                    ignored = !pattern.is_negated();
                }
            }
            return !ignored;
        }

        true
    }
}
