//! Schema errors, warnings and the collected report

use serde::Serialize;
use std::fmt;

/// A schema violation. Fatal to producing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaError {
    /// Location in the document, e.g. `jobs.build.steps[3]`
    pub path: String,
    /// Rule identifier, e.g. `step.action.exclusive`
    pub rule: &'static str,
    pub message: String,
}

/// A non-fatal finding, such as an input the registry does not know
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaWarning {
    pub path: String,
    pub rule: &'static str,
    pub message: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path, self.message, self.rule)
    }
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path, self.message, self.rule)
    }
}

/// Every problem found in one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<SchemaError>,
    pub warnings: Vec<SchemaWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, path: impl Into<String>, rule: &'static str, message: impl Into<String>) {
        self.errors.push(SchemaError {
            path: path.into(),
            rule,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, path: impl Into<String>, rule: &'static str, message: impl Into<String>) {
        self.warnings.push(SchemaWarning {
            path: path.into(),
            rule,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors raised at exactly `path`
    pub fn errors_at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a SchemaError> + 'a {
        self.errors.iter().filter(move |e| e.path == path)
    }

    /// Turn every warning into an error
    pub fn promote_warnings(&mut self) {
        for warning in self.warnings.drain(..) {
            self.errors.push(SchemaError {
                path: warning.path,
                rule: warning.rule,
                message: warning.message,
            });
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "workflow failed validation with {} error(s)",
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}
