//! Document loader: YAML text to `WorkflowDocument`

use crate::core::document::{collect_unknown_keys, WorkflowDocument};
use serde::Serialize;
use serde_yaml::Value;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Malformed input. Loading stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}", self.render())]
pub struct ParseError {
    pub message: String,
    /// 1-based line, when the YAML parser reported one
    pub line: Option<usize>,
    /// 1-based column, when the YAML parser reported one
    pub column: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    fn render(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                format!("parse error at line {}, column {}: {}", line, column, self.message)
            }
            _ => format!("parse error: {}", self.message),
        }
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        let location = err.location();
        // serde_yaml appends " at line X column Y" to its own message
        let message = err.to_string();
        let message = match message.find(" at line ") {
            Some(idx) if location.is_some() => message[..idx].to_string(),
            _ => message,
        };
        Self {
            message,
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    }
}

fn not_a_mapping() -> ParseError {
    ParseError::new("top level of a workflow must be a mapping")
}

impl WorkflowDocument {
    /// Load a workflow document from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ParseError::new(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parse a workflow document from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ParseError> {
        if yaml.trim().is_empty() {
            return Err(ParseError::new("document is empty"));
        }

        // Typed pass first so errors name the field they concern, duplicate
        // job names included. The raw tree then feeds unknown-key detection.
        let mut document: WorkflowDocument = match serde_yaml::from_str(yaml) {
            Ok(document) => document,
            Err(err) => {
                if serde_yaml::from_str::<Value>(yaml).is_ok_and(|tree| !tree.is_mapping()) {
                    return Err(not_a_mapping());
                }
                return Err(err.into());
            }
        };

        let tree: Value = serde_yaml::from_str(yaml)?;
        if !tree.is_mapping() {
            return Err(not_a_mapping());
        }
        document.unknown_keys = collect_unknown_keys(&tree);

        debug!(
            jobs = document.jobs.len(),
            unknown_keys = document.unknown_keys.len(),
            "Loaded workflow document"
        );
        Ok(document)
    }
}
