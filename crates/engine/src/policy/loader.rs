//! Policy loading: YAML parse, schema validation, `extends` resolution with
//! cycle detection, and an absolute-path cache that lives for one run.

use crate::error::PolicyError;
use crate::policy::model::{Policy, PolicyDocument};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Default)]
pub struct PolicyLoader {
    cache: HashMap<PathBuf, Policy>,
}

impl PolicyLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and fully resolve the policy at `path`. The orchestrator never
    /// observes a partially loaded policy: any failure is returned before
    /// anything is cached.
    pub fn load(&mut self, path: &Path) -> Result<Policy, PolicyError> {
        let abs = canonical(path)?;
        let mut visiting = Vec::new();
        self.load_resolved(&abs, &mut visiting)
    }

    fn load_resolved(
        &mut self,
        abs: &Path,
        visiting: &mut Vec<PathBuf>,
    ) -> Result<Policy, PolicyError> {
        if let Some(cached) = self.cache.get(abs) {
            debug!(path = %abs.display(), "policy cache hit");
            return Ok(cached.clone());
        }
        if visiting.iter().any(|p| p == abs) {
            return Err(PolicyError::ExtendsCycle(abs.to_path_buf()));
        }

        let text = std::fs::read_to_string(abs)
            .map_err(|_| PolicyError::NotFound(abs.to_path_buf()))?;

        // Two-stage parse so syntax errors and schema errors report
        // distinctly.
        let value: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|e| PolicyError::Yaml {
                path: abs.to_path_buf(),
                reason: e.to_string(),
            })?;
        let doc: PolicyDocument =
            serde_yaml::from_value(value).map_err(|e| PolicyError::Schema {
                path: abs.to_path_buf(),
                violations: vec![e.to_string()],
            })?;

        visiting.push(abs.to_path_buf());
        let policy = match doc.extends.clone() {
            Some(extends) => {
                let parent_path = abs
                    .parent()
                    .map(|dir| dir.join(&extends))
                    .unwrap_or_else(|| PathBuf::from(&extends));
                let parent_abs = canonical(&parent_path)?;
                let parent = self.load_resolved(&parent_abs, visiting)?;
                Policy::merge_child(parent, doc)
            }
            None => Policy::from_document(doc),
        };
        visiting.pop();

        let violations = policy.validate();
        if !violations.is_empty() {
            return Err(PolicyError::Schema {
                path: abs.to_path_buf(),
                violations,
            });
        }

        self.cache.insert(abs.to_path_buf(), policy.clone());
        Ok(policy)
    }
}

fn canonical(path: &Path) -> Result<PathBuf, PolicyError> {
    path.canonicalize()
        .map_err(|_| PolicyError::NotFound(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_simple_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "policy.yaml",
            "version: \"1.0\"\nname: simple\nthresholds:\n  block: 30\n  warn: 60\n",
        );

        let policy = PolicyLoader::new().load(&path).unwrap();
        assert_eq!(policy.name, "simple");
        assert_eq!(policy.thresholds.block, 30);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = PolicyLoader::new()
            .load(Path::new("/no/such/policy.yaml"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::NotFound(_)));
    }

    #[test]
    fn broken_yaml_is_a_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken.yaml", "version: [unclosed\n");
        let err = PolicyLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, PolicyError::Yaml { .. }));
    }

    #[test]
    fn schema_violation_reports_field_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "bad.yaml",
            "version: \"1.0\"\nname: bad\nthresholds:\n  block: 90\n  warn: 10\n",
        );
        let err = PolicyLoader::new().load(&path).unwrap_err();
        match err {
            PolicyError::Schema { violations, .. } => {
                assert!(violations.iter().any(|v| v.contains("thresholds.block")));
            }
            other => panic!("expected schema error, got {other}"),
        }
    }

    #[test]
    fn extends_resolves_relative_to_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(
            dir.path(),
            "base.yaml",
            "version: \"1.0\"\nname: base\nthresholds:\n  block: 20\n  warn: 80\nrules:\n  static_eval_usage:\n    severity: high\n    weight: -20\n    message: from base\n",
        );
        let child = write(
            dir.path().join("nested").as_path(),
            "child.yaml",
            "version: \"1.1\"\nname: child\nextends: ../base.yaml\nthresholds:\n  warn: 75\n",
        );

        let policy = PolicyLoader::new().load(&child).unwrap();
        assert_eq!(policy.name, "child");
        assert_eq!(policy.thresholds.block, 20);
        assert_eq!(policy.thresholds.warn, 75);
        assert_eq!(policy.rules["static_eval_usage"].message, "from base");
    }

    #[test]
    fn extends_cycle_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.yaml",
            "version: \"1.0\"\nname: a\nextends: b.yaml\n",
        );
        let a = dir.path().join("a.yaml");
        write(
            dir.path(),
            "b.yaml",
            "version: \"1.0\"\nname: b\nextends: a.yaml\n",
        );

        let err = PolicyLoader::new().load(&a).unwrap_err();
        assert!(matches!(err, PolicyError::ExtendsCycle(_)));
    }

    #[test]
    fn cache_returns_same_policy_for_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "policy.yaml",
            "version: \"1.0\"\nname: cached\n",
        );

        let mut loader = PolicyLoader::new();
        let first = loader.load(&path).unwrap();
        fs::write(&path, "version: \"9.9\"\nname: changed\n").unwrap();
        let second = loader.load(&path).unwrap();
        // Second load is served from the cache for the run's lifetime.
        assert_eq!(first.name, second.name);
    }

    #[test]
    fn loaded_policy_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "policy.yaml",
            "version: \"1.0\"\nname: round\nrules:\n  skill_sudo_usage:\n    severity: medium\n    weight: -10\n    message: sudo\n",
        );

        let policy = PolicyLoader::new().load(&path).unwrap();
        let yaml = serde_yaml::to_string(&policy).unwrap();
        let reparsed: Policy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reparsed.rules.len(), policy.rules.len());
        assert_eq!(reparsed.thresholds, policy.thresholds);
    }
}
