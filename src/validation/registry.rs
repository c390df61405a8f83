//! Registry of known actions and their inputs

use crate::core::step::ActionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One input an action accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

/// Expected shape of an action's `with:` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSchema {
    /// Action name without version, e.g. `actions/checkout`
    pub name: String,

    /// Parameter schema used to type the inputs
    #[serde(default = "default_kind")]
    pub kind: ActionKind,

    #[serde(default)]
    pub inputs: Vec<InputSpec>,
}

fn default_kind() -> ActionKind {
    ActionKind::Generic
}

impl ActionSchema {
    pub fn new(name: &str, kind: ActionKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            inputs: Vec::new(),
        }
    }

    fn optional(mut self, names: &[&str]) -> Self {
        self.inputs.extend(names.iter().map(|n| InputSpec {
            name: n.to_string(),
            required: false,
        }));
        self
    }

    fn required(mut self, names: &[&str]) -> Self {
        self.inputs.extend(names.iter().map(|n| InputSpec {
            name: n.to_string(),
            required: true,
        }));
        self
    }

    pub fn accepts(&self, input: &str) -> bool {
        self.inputs.iter().any(|i| i.name == input)
    }

    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|i| i.required)
            .map(|i| i.name.as_str())
    }
}

/// Immutable lookup table of known actions.
///
/// Built once (built-ins plus any configured extras) and handed to the
/// validator by reference.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionSchema>,
}

impl ActionRegistry {
    /// A registry that knows no actions
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the commonly used actions
    pub fn builtin() -> Self {
        Self::empty().extend([
            ActionSchema::new("actions/checkout", ActionKind::Checkout).optional(&[
                "repository",
                "ref",
                "token",
                "ssh-key",
                "ssh-known-hosts",
                "ssh-strict",
                "persist-credentials",
                "path",
                "clean",
                "fetch-depth",
                "fetch-tags",
                "lfs",
                "submodules",
                "sparse-checkout",
                "sparse-checkout-cone-mode",
                "set-safe-directory",
            ]),
            ActionSchema::new("actions/setup-python", ActionKind::SetupTool).optional(&[
                "python-version",
                "python-version-file",
                "cache",
                "architecture",
                "check-latest",
                "token",
                "cache-dependency-path",
                "update-environment",
                "allow-prereleases",
            ]),
            ActionSchema::new("actions/setup-node", ActionKind::SetupTool).optional(&[
                "node-version",
                "node-version-file",
                "architecture",
                "check-latest",
                "registry-url",
                "scope",
                "token",
                "cache",
                "cache-dependency-path",
                "always-auth",
            ]),
            ActionSchema::new("actions/cache", ActionKind::Cache)
                .required(&["path", "key"])
                .optional(&[
                    "restore-keys",
                    "upload-chunk-size",
                    "enableCrossOsArchive",
                    "fail-on-cache-miss",
                    "lookup-only",
                ]),
            ActionSchema::new("codecov/codecov-action", ActionKind::UploadCoverage).optional(&[
                "token",
                "files",
                "file",
                "flags",
                "name",
                "directory",
                "env_vars",
                "fail_ci_if_error",
                "os",
                "slug",
                "url",
                "verbose",
                "disable_search",
                "plugin",
            ]),
            ActionSchema::new("dawidd6/action-send-mail", ActionKind::SendMail)
                .required(&["subject", "to", "from"])
                .optional(&[
                    "connection_url",
                    "server_address",
                    "server_port",
                    "secure",
                    "username",
                    "password",
                    "body",
                    "html_body",
                    "cc",
                    "bcc",
                    "reply_to",
                    "in_reply_to",
                    "ignore_cert",
                    "convert_markdown",
                    "attachments",
                    "priority",
                    "nodemailerlog",
                    "nodemailerdebug",
                ]),
        ])
    }

    /// Return a registry that also knows `schemas`. Later entries replace
    /// earlier ones with the same name.
    pub fn extend(mut self, schemas: impl IntoIterator<Item = ActionSchema>) -> Self {
        for schema in schemas {
            self.actions.insert(schema.name.clone(), schema);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ActionSchema> {
        self.actions.get(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_knows_checkout() {
        let registry = ActionRegistry::builtin();
        let checkout = registry.get("actions/checkout").unwrap();
        assert_eq!(checkout.kind, ActionKind::Checkout);
        assert!(checkout.accepts("fetch-depth"));
        assert!(!checkout.accepts("python-version"));
        assert_eq!(checkout.required_inputs().count(), 0);
    }

    #[test]
    fn test_required_inputs() {
        let registry = ActionRegistry::builtin();
        let mail = registry.get("dawidd6/action-send-mail").unwrap();
        let required: Vec<_> = mail.required_inputs().collect();
        assert_eq!(required, vec!["subject", "to", "from"]);
    }

    #[test]
    fn test_extend_overrides() {
        let registry = ActionRegistry::builtin().extend([ActionSchema {
            name: "actions/checkout".to_string(),
            kind: ActionKind::Generic,
            inputs: vec![],
        }]);
        assert_eq!(registry.get("actions/checkout").unwrap().kind, ActionKind::Generic);
        assert_eq!(registry.len(), ActionRegistry::builtin().len());
    }

    #[test]
    fn test_schema_from_yaml() {
        let schema: ActionSchema = serde_yaml::from_str(
            r#"
name: acme/deploy
inputs:
  - name: environment
    required: true
  - name: dry-run
"#,
        )
        .unwrap();
        assert_eq!(schema.kind, ActionKind::Generic);
        assert_eq!(schema.required_inputs().collect::<Vec<_>>(), vec!["environment"]);
    }
}
