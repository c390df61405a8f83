//! Workflow document model as read from YAML
//!
//! These types mirror the document shape closely and are deliberately
//! lenient: required fields are optional here so the validator can report
//! every missing piece at once instead of serde failing on the first one.

use crate::core::step::Setting;
use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::marker::PhantomData;

/// Root of a workflow document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow display name
    #[serde(default)]
    pub name: Option<String>,

    /// Trigger events (`on:` block)
    #[serde(rename = "on", default)]
    pub on: Option<TriggerSpec>,

    /// Workflow-level environment
    #[serde(default)]
    pub env: IndexMap<String, Value>,

    /// Jobs in declaration order
    #[serde(default, deserialize_with = "unique_keys")]
    pub jobs: IndexMap<String, JobDefinition>,

    /// Keys the schema does not recognise, collected by the loader
    #[serde(skip)]
    pub unknown_keys: Vec<UnknownKey>,
}

/// A single job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Human-readable job name
    #[serde(default)]
    pub name: Option<String>,

    /// Runner environment identifier
    #[serde(rename = "runs-on", alias = "runner", default)]
    pub runs_on: Option<RunsOn>,

    /// Jobs that must finish before this one starts
    #[serde(default)]
    pub needs: OneOrMany,

    /// Job-level guard predicate
    #[serde(rename = "if", default)]
    pub condition: Option<String>,

    /// Job-level environment
    #[serde(default)]
    pub env: IndexMap<String, Value>,

    /// Steps in declaration order
    #[serde(default)]
    pub steps: Vec<StepDefinition>,

    /// A failure of this job does not fail dependants
    #[serde(rename = "continue-on-error", default)]
    pub continue_on_error: Option<Setting<bool>>,
}

/// A single step inside a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Optional identifier, unique within the job
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Action reference, e.g. `actions/checkout@v2`
    #[serde(default)]
    pub uses: Option<String>,

    /// Inline shell command
    #[serde(default)]
    pub run: Option<String>,

    /// Action inputs
    #[serde(rename = "with", default)]
    pub with: IndexMap<String, Value>,

    /// Step environment
    #[serde(default)]
    pub env: IndexMap<String, Value>,

    /// Guard predicate, e.g. `failure()`
    #[serde(rename = "if", default)]
    pub condition: Option<String>,

    /// Shell used for `run`
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(rename = "working-directory", default)]
    pub working_directory: Option<String>,

    /// A failure of this step does not fail the job
    #[serde(rename = "continue-on-error", default)]
    pub continue_on_error: Option<Setting<bool>>,
}

impl StepDefinition {
    /// Label for logs and reports: name, then id, then the action or command
    pub fn label(&self, index: usize) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(id) = &self.id {
            return id.clone();
        }
        if let Some(uses) = &self.uses {
            return uses.clone();
        }
        if let Some(run) = &self.run {
            let first = run.lines().next().unwrap_or_default().trim();
            return format!("run: {}", first);
        }
        format!("step {}", index + 1)
    }
}

/// The `on:` block in any of its three spellings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TriggerSpec {
    /// `on: push`
    Event(String),
    /// `on: [push, pull_request]`
    Events(Vec<String>),
    /// `on: { push: { branches: [main] } }`
    Detailed(IndexMap<String, Value>),
}

/// The `runs-on:` value: a label, a label list or a runner group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunsOn {
    /// `runs-on: ubuntu-latest`
    Label(String),
    /// `runs-on: [self-hosted, linux]`
    Labels(Vec<String>),
    /// `runs-on: { group: ubuntu-runners, labels: [ubuntu-20.04-16core] }`
    Group {
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        labels: OneOrMany,
    },
}

impl RunsOn {
    /// Runner identifier for plans and reports, empty when nothing is named.
    /// A group is shown as `group:<name>` ahead of its labels.
    pub fn render(&self) -> String {
        let parts: Vec<String> = match self {
            RunsOn::Label(label) => vec![label.trim().to_string()],
            RunsOn::Labels(labels) => labels.iter().map(|l| l.trim().to_string()).collect(),
            RunsOn::Group { group, labels } => group
                .iter()
                .map(|g| g.trim())
                .filter(|g| !g.is_empty())
                .map(|g| format!("group:{}", g))
                .chain(labels.iter().map(|l| l.trim().to_string()))
                .collect(),
        };
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A value written either as a single string or as a list of strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OneOrManyRepr", into = "Vec<String>")]
pub struct OneOrMany(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrManyRepr {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrManyRepr> for OneOrMany {
    fn from(repr: OneOrManyRepr) -> Self {
        match repr {
            OneOrManyRepr::One(s) => OneOrMany(vec![s]),
            OneOrManyRepr::Many(v) => OneOrMany(v),
        }
    }
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        value.0
    }
}

impl OneOrMany {
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A key present in the document that the schema does not know about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownKey {
    /// Path of the mapping holding the key, e.g. `jobs.build`
    pub path: String,
    pub key: String,
}

pub(crate) const WORKFLOW_KEYS: &[&str] = &[
    "name", "run-name", "on", "env", "jobs", "permissions", "concurrency", "defaults",
];

pub(crate) const JOB_KEYS: &[&str] = &[
    "name", "runs-on", "runner", "needs", "if", "env", "steps", "continue-on-error",
    "timeout-minutes", "strategy", "permissions", "outputs", "environment", "services",
    "container", "defaults", "concurrency",
];

pub(crate) const STEP_KEYS: &[&str] = &[
    "id", "name", "uses", "run", "with", "env", "if", "shell", "working-directory",
    "continue-on-error", "timeout-minutes",
];

/// Walk the raw tree and record keys outside the known sets
pub(crate) fn collect_unknown_keys(tree: &Value) -> Vec<UnknownKey> {
    let mut unknown = Vec::new();
    let Some(root) = tree.as_mapping() else {
        return unknown;
    };

    scan_mapping(root, "workflow", WORKFLOW_KEYS, &mut unknown);

    let jobs = root.get("jobs").and_then(Value::as_mapping);
    for (job_key, job) in jobs.into_iter().flatten() {
        let (Some(job_name), Some(job)) = (job_key.as_str(), job.as_mapping()) else {
            continue;
        };
        let job_path = format!("jobs.{}", job_name);
        scan_mapping(job, &job_path, JOB_KEYS, &mut unknown);

        let steps = job.get("steps").and_then(Value::as_sequence);
        for (index, step) in steps.into_iter().flatten().enumerate() {
            if let Some(step) = step.as_mapping() {
                let step_path = format!("{}.steps[{}]", job_path, index);
                scan_mapping(step, &step_path, STEP_KEYS, &mut unknown);
            }
        }
    }

    unknown
}

fn scan_mapping(
    mapping: &serde_yaml::Mapping,
    path: &str,
    known: &[&str],
    unknown: &mut Vec<UnknownKey>,
) {
    for key in mapping.keys() {
        let key = match key {
            Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other)
                .unwrap_or_default()
                .trim()
                .to_string(),
        };
        if !known.contains(&key.as_str()) {
            unknown.push(UnknownKey {
                path: path.to_string(),
                key,
            });
        }
    }
}

/// Deserialize a mapping into an `IndexMap`, rejecting repeated keys
fn unique_keys<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueKeys<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueKeys<V> {
        type Value = IndexMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a mapping of job names to job definitions")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(IndexMap::new())
        }

        fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
            let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(de::Error::custom(format!("duplicate job name `{}`", key)));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_any(UniqueKeys(PhantomData))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_or_many_accepts_both_forms() {
        let one: OneOrMany = serde_yaml::from_str("build").unwrap();
        assert_eq!(one.0, vec!["build"]);

        let many: OneOrMany = serde_yaml::from_str("[build, lint]").unwrap();
        assert_eq!(many.0, vec!["build", "lint"]);
    }

    #[test]
    fn test_runs_on_forms() {
        let label: RunsOn = serde_yaml::from_str("ubuntu-latest").unwrap();
        assert_eq!(label.render(), "ubuntu-latest");

        let labels: RunsOn = serde_yaml::from_str("[self-hosted, linux]").unwrap();
        assert_eq!(labels, RunsOn::Labels(vec!["self-hosted".into(), "linux".into()]));
        assert_eq!(labels.render(), "self-hosted, linux");

        let group: RunsOn = serde_yaml::from_str("{ group: large, labels: gpu }").unwrap();
        assert_eq!(group.render(), "group:large, gpu");

        let empty: RunsOn = serde_yaml::from_str("[]").unwrap();
        assert_eq!(empty.render(), "");
    }

    #[test]
    fn test_continue_on_error_accepts_expressions() {
        let job: JobDefinition = serde_yaml::from_str(
            r#"
runs-on: ubuntu-latest
continue-on-error: ${{ matrix.experimental }}
steps:
  - run: make
    continue-on-error: true
"#,
        )
        .unwrap();

        assert_eq!(
            job.continue_on_error,
            Some(Setting::Expression("${{ matrix.experimental }}".to_string()))
        );
        assert_eq!(job.steps[0].continue_on_error, Some(Setting::Value(true)));
    }

    #[test]
    fn test_step_label_fallbacks() {
        let step = StepDefinition {
            uses: Some("actions/checkout@v2".to_string()),
            ..Default::default()
        };
        assert_eq!(step.label(0), "actions/checkout@v2");

        let step = StepDefinition {
            run: Some("cargo test\ncargo build".to_string()),
            ..Default::default()
        };
        assert_eq!(step.label(0), "run: cargo test");

        assert_eq!(StepDefinition::default().label(2), "step 3");
    }

    #[test]
    fn test_collect_unknown_keys() {
        let tree: Value = serde_yaml::from_str(
            r#"
name: ci
colour: blue
jobs:
  build:
    runs-on: ubuntu-latest
    flavour: spicy
    steps:
      - run: make
        retries: 3
"#,
        )
        .unwrap();

        let unknown = collect_unknown_keys(&tree);
        let found: Vec<_> = unknown
            .iter()
            .map(|u| format!("{}:{}", u.path, u.key))
            .collect();
        assert_eq!(
            found,
            vec![
                "workflow:colour",
                "jobs.build:flavour",
                "jobs.build.steps[0]:retries",
            ]
        );
    }
}
