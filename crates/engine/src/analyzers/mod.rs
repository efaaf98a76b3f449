//! Analyzer contract and the shared pattern-scanning helpers.
//!
//! An analyzer is a pure pattern scanner: it receives the full file list,
//! filters to the paths it cares about, and emits findings ordered by
//! (file in walker order, rule declaration order, match position). File
//! reads that fail yield no findings, never an error.

pub mod ci_risk;
pub mod dependency;
pub mod entrypoint;
pub mod secret;
pub mod skill_doc;
pub mod static_code;

pub use ci_risk::CiRiskAnalyzer;
pub use dependency::DependencyAnalyzer;
pub use entrypoint::EntrypointAnalyzer;
pub use secret::SecretAnalyzer;
pub use skill_doc::SkillDocAnalyzer;
pub use static_code::StaticCodeAnalyzer;

use crate::core::{AnalyzerKind, Finding, Location, Severity};
use crate::policy::Policy;
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only input every analyzer receives from the orchestrator.
#[derive(Debug, Clone)]
pub struct ScanInput {
    pub root_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub policy: Option<Arc<Policy>>,
}

impl ScanInput {
    pub fn new(root_dir: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            files,
            policy: None,
        }
    }

    /// Relative path of `abs` under the scan root, forward slashes.
    pub fn relative(&self, abs: &Path) -> String {
        abs.strip_prefix(&self.root_dir)
            .unwrap_or(abs)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;

    fn name(&self) -> &'static str;

    async fn scan(&self, input: &ScanInput) -> Result<Vec<Finding>>;
}

/// 1-based line number of a byte offset, from the newlines in the prefix.
pub(crate) fn line_of_offset(content: &str, offset: usize) -> usize {
    content[..offset.min(content.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count()
        + 1
}

/// Bound evidence to `max` characters without splitting a char boundary.
pub(crate) fn truncate_evidence(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

pub(crate) const EVIDENCE_MAX: usize = 100;

/// Read a file as lossy UTF-8, truncated at `cap` bytes when given.
/// `None` on any read failure.
pub(crate) async fn read_text(path: &Path, cap: Option<usize>) -> Option<String> {
    let mut bytes = tokio::fs::read(path).await.ok()?;
    if let Some(cap) = cap {
        if bytes.len() > cap {
            bytes.truncate(cap);
        }
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// One declarative content rule: a compiled pattern plus the finding shape
/// it produces.
pub(crate) struct PatternRule {
    pub id: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    pub pattern: Regex,
    /// Credential-category evidence is masked before it leaves the analyzer.
    pub mask_evidence: bool,
    /// Extra veto applied to each raw match (e.g. excluding `sk-ant-` from
    /// the OpenAI key shape, since the regex engine has no lookahead).
    pub reject: Option<fn(&str) -> bool>,
}

impl PatternRule {
    pub fn new(
        id: &'static str,
        severity: Severity,
        message: &'static str,
        pattern: &str,
    ) -> Self {
        Self {
            id,
            severity,
            message,
            pattern: Regex::new(pattern).expect("static rule pattern must compile"),
            mask_evidence: false,
            reject: None,
        }
    }

    pub fn masked(mut self) -> Self {
        self.mask_evidence = true;
        self
    }

    pub fn rejecting(mut self, reject: fn(&str) -> bool) -> Self {
        self.reject = Some(reject);
        self
    }
}

/// Run a rule table over one file's content, producing findings in rule
/// declaration order then match position. Capture group 1 narrows the
/// evidence when a rule's pattern uses one.
pub(crate) fn scan_content(
    kind: AnalyzerKind,
    rules: &[PatternRule],
    relative_path: &str,
    content: &str,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for rule in rules {
        for caps in rule.pattern.captures_iter(content) {
            let m = caps.get(1).unwrap_or_else(|| caps.get(0).unwrap());
            if let Some(reject) = rule.reject {
                if reject(caps.get(0).unwrap().as_str()) {
                    continue;
                }
            }

            let mut evidence = truncate_evidence(m.as_str(), EVIDENCE_MAX);
            if rule.mask_evidence {
                evidence = crate::core::mask_secrets(&evidence);
            }

            findings.push(
                Finding::new(
                    kind,
                    rule.severity,
                    rule.id,
                    rule.message,
                    Location::new(relative_path).with_line(line_of_offset(content, m.start())),
                )
                .with_evidence(evidence),
            );
        }
    }
    findings
}

/// Case-insensitive extension check.
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|candidate| *candidate == ext)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_of_offset_is_one_based() {
        let content = "first\nsecond\nthird";
        assert_eq!(line_of_offset(content, 0), 1);
        assert_eq!(line_of_offset(content, 6), 2);
        assert_eq!(line_of_offset(content, content.len()), 3);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(150);
        let truncated = truncate_evidence(&text, 100);
        assert_eq!(truncated.chars().count(), 100);
    }

    #[test]
    fn scan_content_orders_by_rule_then_position() {
        let rules = vec![
            PatternRule::new("x_first", Severity::High, "first rule", "aaa"),
            PatternRule::new("x_second", Severity::Low, "second rule", "bbb"),
        ];
        let findings = scan_content(AnalyzerKind::Static, &rules, "f.txt", "bbb aaa bbb aaa");
        let ids: Vec<_> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["x_first", "x_first", "x_second", "x_second"]);
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_extension(Path::new("README.MD"), &["md"]));
        assert!(!has_extension(Path::new("README"), &["md"]));
    }
}
