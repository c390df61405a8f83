//! Step action model: action references and typed parameters

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Parsed `uses:` reference. The action itself stays opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRef {
    /// `owner/repo[/path]@ref`
    Remote {
        owner: String,
        repo: String,
        path: Option<String>,
        git_ref: String,
    },
    /// `./path/in/repo`
    Local { path: String },
    /// `docker://image:tag`
    Docker { image: String },
}

fn remote_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)((?:/[^@\s]+)?)@([^@\s]+)$")
            .expect("static regex is valid")
    })
}

impl ActionRef {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if let Some(image) = raw.strip_prefix("docker://") {
            if image.is_empty() || image.chars().any(char::is_whitespace) {
                return Err("docker reference needs an image name".to_string());
            }
            return Ok(ActionRef::Docker {
                image: image.to_string(),
            });
        }

        if raw.starts_with("./") {
            if raw.len() == 2 || raw.contains('@') {
                return Err("local action must be a path like ./path/to/action".to_string());
            }
            return Ok(ActionRef::Local {
                path: raw.to_string(),
            });
        }

        let caps = remote_pattern().captures(raw).ok_or_else(|| {
            "expected owner/repo@ref, ./local/path or docker://image".to_string()
        })?;
        let path = caps
            .get(3)
            .map(|m| m.as_str().trim_start_matches('/'))
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(ActionRef::Remote {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            path,
            git_ref: caps[4].to_string(),
        })
    }

    /// Registry key: the reference without its version
    pub fn name(&self) -> String {
        match self {
            ActionRef::Remote {
                owner, repo, path, ..
            } => match path {
                Some(path) => format!("{}/{}/{}", owner, repo, path),
                None => format!("{}/{}", owner, repo),
            },
            ActionRef::Local { path } => path.clone(),
            ActionRef::Docker { image } => format!("docker://{}", image),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionRef::Remote { git_ref, .. } => write!(f, "{}@{}", self.name(), git_ref),
            _ => f.write_str(&self.name()),
        }
    }
}

impl Serialize for ActionRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Family of an action, decides which parameter schema applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Checkout,
    SetupTool,
    Cache,
    UploadCoverage,
    SendMail,
    Generic,
}

/// A typed parameter that may instead be a `${{ }}` expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting<T> {
    Value(T),
    Expression(String),
}

/// Conversion problem for a single input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamIssue {
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutParams {
    pub repository: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub fetch_depth: Option<Setting<u32>>,
    pub submodules: Option<String>,
    pub token: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetupToolParams {
    /// Tool being installed, e.g. `python` for `python-version`
    pub tool: Option<String>,
    pub version: Option<String>,
    pub cache: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheParams {
    pub path: Vec<String>,
    pub key: Option<String>,
    pub restore_keys: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageParams {
    pub token: Option<String>,
    pub files: Vec<String>,
    pub flags: Vec<String>,
    pub fail_ci_if_error: Option<Setting<bool>>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MailParams {
    pub server_address: Option<String>,
    pub server_port: Option<Setting<u16>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub subject: Option<String>,
    pub to: Vec<String>,
    pub from: Option<String>,
    pub body: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, String>,
}

/// Parameters of a `uses:` step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepParams {
    Checkout(CheckoutParams),
    SetupTool(SetupToolParams),
    Cache(CacheParams),
    UploadCoverage(CoverageParams),
    SendMail(MailParams),
    Generic { inputs: IndexMap<String, String> },
}

impl StepParams {
    /// Build typed parameters for an action kind from its string inputs.
    /// Keys a schema does not model go to `extra`.
    pub fn from_inputs(
        kind: ActionKind,
        inputs: &IndexMap<String, String>,
    ) -> Result<Self, Vec<ParamIssue>> {
        let mut issues = Vec::new();

        let params = match kind {
            ActionKind::Checkout => {
                let mut p = CheckoutParams::default();
                for (key, value) in inputs {
                    match key.as_str() {
                        "repository" => p.repository = Some(value.clone()),
                        "ref" => p.git_ref = Some(value.clone()),
                        "fetch-depth" => p.fetch_depth = typed(key, value, &mut issues),
                        "submodules" => p.submodules = Some(value.clone()),
                        "token" => p.token = Some(value.clone()),
                        _ => {
                            p.extra.insert(key.clone(), value.clone());
                        }
                    }
                }
                StepParams::Checkout(p)
            }
            ActionKind::SetupTool => {
                let mut p = SetupToolParams::default();
                for (key, value) in inputs {
                    if let Some(tool) = key.strip_suffix("-version") {
                        p.tool = Some(tool.to_string());
                        p.version = Some(value.clone());
                    } else if key == "cache" {
                        p.cache = Some(value.clone());
                    } else {
                        p.extra.insert(key.clone(), value.clone());
                    }
                }
                StepParams::SetupTool(p)
            }
            ActionKind::Cache => {
                let mut p = CacheParams::default();
                for (key, value) in inputs {
                    match key.as_str() {
                        "path" => p.path = split_list(value),
                        "key" => p.key = Some(value.clone()),
                        "restore-keys" => p.restore_keys = split_list(value),
                        _ => {
                            p.extra.insert(key.clone(), value.clone());
                        }
                    }
                }
                StepParams::Cache(p)
            }
            ActionKind::UploadCoverage => {
                let mut p = CoverageParams::default();
                for (key, value) in inputs {
                    match key.as_str() {
                        "token" => p.token = Some(value.clone()),
                        "files" | "file" => p.files.extend(split_list(value)),
                        "flags" => p.flags = split_list(value),
                        "fail_ci_if_error" => p.fail_ci_if_error = typed(key, value, &mut issues),
                        _ => {
                            p.extra.insert(key.clone(), value.clone());
                        }
                    }
                }
                StepParams::UploadCoverage(p)
            }
            ActionKind::SendMail => {
                let mut p = MailParams::default();
                for (key, value) in inputs {
                    match key.as_str() {
                        "server_address" => p.server_address = Some(value.clone()),
                        "server_port" => p.server_port = typed(key, value, &mut issues),
                        "username" => p.username = Some(value.clone()),
                        "password" => p.password = Some(value.clone()),
                        "subject" => p.subject = Some(value.clone()),
                        "to" => p.to = split_list(value),
                        "from" => p.from = Some(value.clone()),
                        "body" => p.body = Some(value.clone()),
                        _ => {
                            p.extra.insert(key.clone(), value.clone());
                        }
                    }
                }
                StepParams::SendMail(p)
            }
            ActionKind::Generic => StepParams::Generic {
                inputs: inputs.clone(),
            },
        };

        if issues.is_empty() {
            Ok(params)
        } else {
            Err(issues)
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            StepParams::Checkout(_) => ActionKind::Checkout,
            StepParams::SetupTool(_) => ActionKind::SetupTool,
            StepParams::Cache(_) => ActionKind::Cache,
            StepParams::UploadCoverage(_) => ActionKind::UploadCoverage,
            StepParams::SendMail(_) => ActionKind::SendMail,
            StepParams::Generic { .. } => ActionKind::Generic,
        }
    }
}

fn typed<T: FromStr>(key: &str, value: &str, issues: &mut Vec<ParamIssue>) -> Option<Setting<T>> {
    if value.contains("${{") {
        return Some(Setting::Expression(value.to_string()));
    }
    match value.trim().parse::<T>() {
        Ok(v) => Some(Setting::Value(v)),
        Err(_) => {
            issues.push(ParamIssue {
                key: key.to_string(),
                message: format!(
                    "`{}` is not a valid {}",
                    value,
                    std::any::type_name::<T>()
                ),
            });
            None
        }
    }
}

/// Split a multi-line or comma separated input into items
fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == '\n' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// What a planned step does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    Uses {
        action: ActionRef,
        params: StepParams,
    },
    Run {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        shell: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_remote_ref() {
        let action = ActionRef::parse("actions/checkout@v2").unwrap();
        assert_eq!(
            action,
            ActionRef::Remote {
                owner: "actions".to_string(),
                repo: "checkout".to_string(),
                path: None,
                git_ref: "v2".to_string(),
            }
        );
        assert_eq!(action.name(), "actions/checkout");
        assert_eq!(action.to_string(), "actions/checkout@v2");
    }

    #[test]
    fn test_parse_ref_with_path() {
        let action = ActionRef::parse("github/codeql-action/init@v3").unwrap();
        assert_eq!(action.name(), "github/codeql-action/init");
    }

    #[test]
    fn test_parse_local_and_docker() {
        assert_eq!(
            ActionRef::parse("./.github/actions/build").unwrap(),
            ActionRef::Local {
                path: "./.github/actions/build".to_string()
            }
        );
        assert_eq!(
            ActionRef::parse("docker://alpine:3.19").unwrap().name(),
            "docker://alpine:3.19"
        );
    }

    #[test]
    fn test_parse_invalid_refs() {
        assert!(ActionRef::parse("actions/checkout").is_err());
        assert!(ActionRef::parse("checkout@v2").is_err());
        assert!(ActionRef::parse("actions/checkout@").is_err());
        assert!(ActionRef::parse("docker://").is_err());
        assert!(ActionRef::parse("./").is_err());
    }

    #[test]
    fn test_checkout_params() {
        let params = StepParams::from_inputs(
            ActionKind::Checkout,
            &inputs(&[("fetch-depth", "0"), ("ref", "main"), ("lfs", "true")]),
        )
        .unwrap();

        match params {
            StepParams::Checkout(p) => {
                assert_eq!(p.fetch_depth, Some(Setting::Value(0)));
                assert_eq!(p.git_ref.as_deref(), Some("main"));
                assert_eq!(p.extra.get("lfs").map(String::as_str), Some("true"));
            }
            other => panic!("expected checkout params, got {:?}", other),
        }
    }

    #[test]
    fn test_typed_value_errors() {
        let issues =
            StepParams::from_inputs(ActionKind::Checkout, &inputs(&[("fetch-depth", "deep")]))
                .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, "fetch-depth");
    }

    #[test]
    fn test_expression_values_are_deferred() {
        let params = StepParams::from_inputs(
            ActionKind::SendMail,
            &inputs(&[("server_port", "${{ secrets.MAIL_PORT }}")]),
        )
        .unwrap();
        match params {
            StepParams::SendMail(p) => assert_eq!(
                p.server_port,
                Some(Setting::Expression("${{ secrets.MAIL_PORT }}".to_string()))
            ),
            other => panic!("expected mail params, got {:?}", other),
        }
    }

    #[test]
    fn test_setup_tool_and_coverage() {
        let setup =
            StepParams::from_inputs(ActionKind::SetupTool, &inputs(&[("python-version", "3.8")]))
                .unwrap();
        assert_eq!(
            setup,
            StepParams::SetupTool(SetupToolParams {
                tool: Some("python".to_string()),
                version: Some("3.8".to_string()),
                ..Default::default()
            })
        );

        let coverage = StepParams::from_inputs(
            ActionKind::UploadCoverage,
            &inputs(&[("files", "./coverage.xml, ./other.xml"), ("fail_ci_if_error", "true")]),
        )
        .unwrap();
        match coverage {
            StepParams::UploadCoverage(p) => {
                assert_eq!(p.files, vec!["./coverage.xml", "./other.xml"]);
                assert_eq!(p.fail_ci_if_error, Some(Setting::Value(true)));
            }
            other => panic!("expected coverage params, got {:?}", other),
        }
    }

    #[test]
    fn test_generic_keeps_inputs_in_order() {
        let raw = inputs(&[("b", "2"), ("a", "1")]);
        let params = StepParams::from_inputs(ActionKind::Generic, &raw).unwrap();
        assert_eq!(params, StepParams::Generic { inputs: raw });
        assert_eq!(params.kind(), ActionKind::Generic);
    }
}
