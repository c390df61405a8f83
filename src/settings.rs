//! Tool settings file

use crate::execution::{FailurePolicy, SchedulingStrategy};
use crate::validation::{ActionRegistry, ActionSchema};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Error types for settings loading
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Settings that shape validation and simulated runs
///
/// ```yaml
/// strict: true
/// failure_policy: fail-fast
/// strategy:
///   limited_parallel: 2
/// assume_unknown: false
/// actions:
///   - name: my-org/deploy
///     inputs:
///       - { name: environment, required: true }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Treat warnings as errors
    pub strict: bool,

    pub failure_policy: FailurePolicy,

    pub strategy: SchedulingStrategy,

    /// Value of guard operands that no assumption covers
    pub assume_unknown: bool,

    /// Extra registry entries; an entry replaces a built-in of the same name
    pub actions: Vec<ActionSchema>,
}

impl ToolSettings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded settings from {}", path.display());
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Built-in actions plus the ones configured here
    pub fn registry(&self) -> ActionRegistry {
        ActionRegistry::builtin().extend(self.actions.iter().cloned())
    }
}
