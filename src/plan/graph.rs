//! Job dependency graph: cycle detection and stage layering

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// `needs` declarations form a cycle
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("dependency cycle between jobs: {}", self.render())]
pub struct CycleError {
    /// Members of the cycle in dependency order, starting at the first
    /// member reached in declaration order
    pub members: Vec<String>,
}

impl CycleError {
    fn render(&self) -> String {
        let mut parts = self.members.clone();
        if let Some(first) = self.members.first() {
            parts.push(first.clone());
        }
        parts.join(" -> ")
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Depth-first search over `needs`, reporting the first cycle found.
/// Nodes are visited in declaration order so the result is deterministic.
pub(crate) fn find_cycle(needs: &IndexMap<String, Vec<String>>) -> Result<(), CycleError> {
    let mut colors: HashMap<&str, Color> = needs.keys().map(|k| (k.as_str(), Color::White)).collect();
    let mut path: Vec<&str> = Vec::new();

    for job in needs.keys() {
        if colors.get(job.as_str()) == Some(&Color::White) {
            visit(job, needs, &mut colors, &mut path)?;
        }
    }
    Ok(())
}

fn visit<'a>(
    job: &'a str,
    needs: &'a IndexMap<String, Vec<String>>,
    colors: &mut HashMap<&'a str, Color>,
    path: &mut Vec<&'a str>,
) -> Result<(), CycleError> {
    colors.insert(job, Color::Grey);
    path.push(job);

    for dep in needs.get(job).into_iter().flatten() {
        match colors.get(dep.as_str()).copied() {
            Some(Color::Grey) => {
                let start = path.iter().position(|j| *j == dep.as_str()).unwrap_or(0);
                return Err(CycleError {
                    members: path[start..].iter().map(|j| j.to_string()).collect(),
                });
            }
            Some(Color::White) => visit(dep, needs, colors, path)?,
            // Finished, or not a job in this graph
            Some(Color::Black) | None => {}
        }
    }

    path.pop();
    colors.insert(job, Color::Black);
    Ok(())
}

/// Group jobs into stages: a job's stage is one past the deepest stage of
/// the jobs it needs. Jobs in one stage are independent of each other.
/// Declaration order is kept inside a stage. The graph must be acyclic.
pub(crate) fn stages(needs: &IndexMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut depth: HashMap<&str, usize> = HashMap::new();

    fn depth_of<'a>(
        job: &'a str,
        needs: &'a IndexMap<String, Vec<String>>,
        depth: &mut HashMap<&'a str, usize>,
    ) -> usize {
        if let Some(d) = depth.get(job) {
            return *d;
        }
        let d = needs
            .get(job)
            .into_iter()
            .flatten()
            .filter(|dep| needs.contains_key(dep.as_str()))
            .map(|dep| depth_of(dep, needs, depth) + 1)
            .max()
            .unwrap_or(0);
        depth.insert(job, d);
        d
    }

    let mut layered: Vec<Vec<String>> = Vec::new();
    for job in needs.keys() {
        let d = depth_of(job, needs, &mut depth);
        if layered.len() <= d {
            layered.resize_with(d + 1, Vec::new);
        }
        layered[d].push(job.clone());
    }
    layered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> IndexMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(job, deps)| (job.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_two_job_cycle() {
        let needs = graph(&[("A", &["B"]), ("B", &["A"])]);
        let err = find_cycle(&needs).unwrap_err();
        assert_eq!(err.members, vec!["A", "B"]);
        assert_eq!(err.to_string(), "dependency cycle between jobs: A -> B -> A");
    }

    #[test]
    fn test_cycle_reports_only_members() {
        let needs = graph(&[
            ("entry", &["a"]),
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["a"]),
        ]);
        let err = find_cycle(&needs).unwrap_err();
        assert_eq!(err.members, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let needs = graph(&[
            ("build", &[]),
            ("lint", &["build"]),
            ("test", &["build"]),
            ("deploy", &["lint", "test"]),
        ]);
        assert!(find_cycle(&needs).is_ok());
        assert_eq!(
            stages(&needs),
            vec![vec!["build"], vec!["lint", "test"], vec!["deploy"]]
        );
    }

    #[test]
    fn test_independent_jobs_share_a_stage() {
        let needs = graph(&[("build", &[]), ("job2", &[])]);
        assert_eq!(stages(&needs), vec![vec!["build", "job2"]]);
    }

    #[test]
    fn test_stage_uses_longest_path() {
        let needs = graph(&[
            ("deploy", &["package", "build"]),
            ("package", &["build"]),
            ("build", &[]),
        ]);
        assert_eq!(
            stages(&needs),
            vec![vec!["build"], vec!["package"], vec!["deploy"]]
        );
    }
}
