//! Policy schema and validation.
//!
//! A policy file is YAML with a fixed key set; unknown top-level fields are
//! rejected at parse time. The raw document form ([`PolicyDocument`]) keeps
//! optional fields optional so inheritance can tell "unset" from "set to the
//! default"; the resolved [`Policy`] is what the engine consumes.

use crate::core::Severity;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_BLOCK_THRESHOLD: u32 = 40;
pub const DEFAULT_WARN_THRESHOLD: u32 = 70;

static VERSION_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").unwrap());

/// Scoring override for one rule id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    pub severity: Severity,
    /// Signed score delta, typically negative.
    pub weight: i32,
    pub message: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Suppression directive: the named rules are ignored for paths matching
/// the glob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Exception {
    #[serde(rename = "pattern")]
    pub path_pattern: String,
    #[serde(rename = "ignore")]
    pub suppressed_rule_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn: Option<u32>,
}

/// Raw policy file as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "is_default_thresholds")]
    pub thresholds: ThresholdsDocument,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub critical_block: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, RuleDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<Exception>,
}

fn is_default_thresholds(t: &ThresholdsDocument) -> bool {
    *t == ThresholdsDocument::default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub block: u32,
    pub warn: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            block: DEFAULT_BLOCK_THRESHOLD,
            warn: DEFAULT_WARN_THRESHOLD,
        }
    }
}

/// Fully resolved policy, inheritance applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub critical_block: BTreeSet<String>,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleDefinition>,
    #[serde(default)]
    pub exceptions: Vec<Exception>,
}

impl Default for Policy {
    /// The compiled-in policy used when none is supplied: default
    /// thresholds, no overrides, no critical-block set, no exceptions.
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "default".to_string(),
            description: Some("built-in default policy".to_string()),
            thresholds: Thresholds::default(),
            critical_block: BTreeSet::new(),
            rules: BTreeMap::new(),
            exceptions: Vec::new(),
        }
    }
}

impl Policy {
    pub fn from_document(doc: PolicyDocument) -> Self {
        Self {
            version: doc.version,
            name: doc.name,
            description: doc.description,
            thresholds: Thresholds {
                block: doc.thresholds.block.unwrap_or(DEFAULT_BLOCK_THRESHOLD),
                warn: doc.thresholds.warn.unwrap_or(DEFAULT_WARN_THRESHOLD),
            },
            critical_block: doc.critical_block.into_iter().collect(),
            rules: doc.rules,
            exceptions: doc.exceptions,
        }
    }

    /// Overlay a child document on a resolved parent: child scalars win,
    /// thresholds merge field by field, critical_block unions, rules union
    /// with child overriding, exceptions concatenate parent-first.
    pub fn merge_child(parent: Policy, child: PolicyDocument) -> Self {
        let mut merged = parent;
        merged.version = child.version;
        merged.name = child.name;
        if child.description.is_some() {
            merged.description = child.description;
        }
        if let Some(block) = child.thresholds.block {
            merged.thresholds.block = block;
        }
        if let Some(warn) = child.thresholds.warn {
            merged.thresholds.warn = warn;
        }
        merged.critical_block.extend(child.critical_block);
        for (rule_id, definition) in child.rules {
            merged.rules.insert(rule_id, definition);
        }
        merged.exceptions.extend(child.exceptions);
        merged
    }

    /// Schema invariants beyond field types, as `path.to.field: reason`
    /// messages. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if !VERSION_SHAPE.is_match(&self.version) {
            violations.push(format!(
                "version: '{}' does not match MAJOR.MINOR or MAJOR.MINOR.PATCH",
                self.version
            ));
        }
        if self.name.is_empty() || self.name.len() > 50 {
            violations.push("name: must be 1-50 characters".to_string());
        }
        if self.thresholds.block > self.thresholds.warn {
            violations.push(format!(
                "thresholds.block: {} must not exceed thresholds.warn {}",
                self.thresholds.block, self.thresholds.warn
            ));
        }
        if self.thresholds.warn > 100 {
            violations.push(format!(
                "thresholds.warn: {} must not exceed 100",
                self.thresholds.warn
            ));
        }
        for (rule_id, definition) in &self.rules {
            if definition.message.is_empty() {
                violations.push(format!("rules.{rule_id}.message: must not be empty"));
            }
        }
        for (index, exception) in self.exceptions.iter().enumerate() {
            if exception.path_pattern.is_empty() {
                violations.push(format!("exceptions[{index}].pattern: must not be empty"));
            }
            if exception.suppressed_rule_ids.is_empty() {
                violations.push(format!(
                    "exceptions[{index}].ignore: must name at least one rule id"
                ));
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_doc() -> PolicyDocument {
        serde_yaml::from_str(
            "version: \"1.0\"\nname: strict\nthresholds:\n  block: 30\n  warn: 60\n",
        )
        .unwrap()
    }

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        let err = serde_yaml::from_str::<PolicyDocument>(
            "version: \"1.0\"\nname: x\nsurprise: true\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("surprise"));
    }

    #[test]
    fn thresholds_default_when_absent() {
        let doc: PolicyDocument =
            serde_yaml::from_str("version: \"1.0\"\nname: bare\n").unwrap();
        let policy = Policy::from_document(doc);
        assert_eq!(policy.thresholds.block, 40);
        assert_eq!(policy.thresholds.warn, 70);
    }

    #[test]
    fn validate_accepts_well_formed_policy() {
        let policy = Policy::from_document(minimal_doc());
        assert!(policy.validate().is_empty());
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut policy = Policy::from_document(minimal_doc());
        policy.thresholds = Thresholds { block: 80, warn: 20 };
        let violations = policy.validate();
        assert!(violations.iter().any(|v| v.starts_with("thresholds.block")));
    }

    #[test]
    fn validate_rejects_bad_version_and_long_name() {
        let mut policy = Policy::from_document(minimal_doc());
        policy.version = "one".to_string();
        policy.name = "n".repeat(51);
        let violations = policy.validate();
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn validate_rejects_empty_rule_message_and_empty_exception() {
        let mut policy = Policy::from_document(minimal_doc());
        policy.rules.insert(
            "static_eval_usage".to_string(),
            RuleDefinition {
                severity: Severity::High,
                weight: -20,
                message: String::new(),
                enabled: true,
            },
        );
        policy.exceptions.push(Exception {
            path_pattern: String::new(),
            suppressed_rule_ids: Vec::new(),
            reason: None,
        });
        let violations = policy.validate();
        assert!(violations
            .iter()
            .any(|v| v == "rules.static_eval_usage.message: must not be empty"));
        assert!(violations
            .iter()
            .any(|v| v.starts_with("exceptions[0].pattern")));
        assert!(violations
            .iter()
            .any(|v| v.starts_with("exceptions[0].ignore")));
    }

    #[test]
    fn merge_overrides_scalars_and_unions_collections() {
        let parent_doc: PolicyDocument = serde_yaml::from_str(
            r#"
version: "1.0"
name: base
thresholds:
  block: 30
  warn: 60
critical_block: [secret_aws_access_key]
rules:
  static_eval_usage:
    severity: high
    weight: -20
    message: parent message
exceptions:
  - pattern: "vendor/**"
    ignore: [static_eval_usage]
"#,
        )
        .unwrap();
        let child_doc: PolicyDocument = serde_yaml::from_str(
            r#"
version: "1.1"
name: strict
thresholds:
  block: 50
critical_block: [skill_rm_rf_root]
rules:
  static_eval_usage:
    severity: critical
    weight: -40
    message: child message
exceptions:
  - pattern: "test/**"
    ignore: [skill_sudo_usage]
"#,
        )
        .unwrap();

        let merged = Policy::merge_child(Policy::from_document(parent_doc), child_doc);

        assert_eq!(merged.name, "strict");
        assert_eq!(merged.version, "1.1");
        // Child set block only; warn comes from the parent.
        assert_eq!(merged.thresholds.block, 50);
        assert_eq!(merged.thresholds.warn, 60);
        assert!(merged.critical_block.contains("secret_aws_access_key"));
        assert!(merged.critical_block.contains("skill_rm_rf_root"));
        assert_eq!(merged.rules["static_eval_usage"].message, "child message");
        assert_eq!(merged.exceptions.len(), 2);
        assert_eq!(merged.exceptions[0].path_pattern, "vendor/**");
    }

    #[test]
    fn policy_round_trips_through_yaml() {
        let policy = Policy::from_document(minimal_doc());
        let yaml = serde_yaml::to_string(&policy).unwrap();
        let reloaded: Policy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reloaded.name, policy.name);
        assert_eq!(reloaded.thresholds, policy.thresholds);
    }
}
