//! Continuous-integration configuration risks: GitHub workflow and GitLab
//! pipeline files.

use crate::analyzers::{read_text, truncate_evidence, Analyzer, ScanInput, EVIDENCE_MAX};
use crate::core::{mask_secrets, AnalyzerKind, Finding, Location, Severity};
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

static PIPE_TO_SHELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:curl|wget)\s+[^\n|]*\|\s*(?:bash|sh)\b").unwrap());
static SECRET_ECHO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"echo[^\n]*\$\{\{\s*secrets\.").unwrap());
static SHA_PIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[0-9a-f]{40}$").unwrap());
static SECRET_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)password|secret|token|api_?key|key").unwrap());

pub struct CiRiskAnalyzer;

impl CiRiskAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CiRiskAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for CiRiskAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::CiRisk
    }

    fn name(&self) -> &'static str {
        "CI configuration scanner"
    }

    async fn scan(&self, input: &ScanInput) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for path in &input.files {
            let relative = input.relative(path);
            let is_workflow = relative.contains(".github/workflows/")
                && (relative.ends_with(".yml") || relative.ends_with(".yaml"));
            let is_gitlab = relative == ".gitlab-ci.yml" || relative.ends_with("/.gitlab-ci.yml");
            if !is_workflow && !is_gitlab {
                continue;
            }

            let Some(content) = read_text(path, None).await else {
                continue;
            };

            let parsed: Value = match serde_yaml::from_str(&content) {
                Ok(value) => value,
                Err(err) => {
                    findings.push(Finding::new(
                        AnalyzerKind::CiRisk,
                        Severity::Info,
                        "ci_parse_error",
                        format!("could not parse CI file: {err}"),
                        Location::new(relative.as_str()),
                    ));
                    continue;
                }
            };

            if is_workflow {
                findings.extend(workflow_findings(&relative, &content, &parsed));
            } else {
                findings.extend(gitlab_findings(&relative, &content, &parsed));
            }
        }
        Ok(findings)
    }
}

fn find_line(content: &str, needle: &str) -> Option<usize> {
    content
        .find(needle)
        .map(|offset| crate::analyzers::line_of_offset(content, offset))
}

fn located(relative_path: &str, content: &str, needle: &str) -> Location {
    let mut location = Location::new(relative_path);
    if let Some(line) = find_line(content, needle) {
        location = location.with_line(line);
    }
    location
}

fn workflow_findings(relative_path: &str, content: &str, doc: &Value) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(permissions) = doc.get("permissions").and_then(Value::as_str) {
        if permissions == "write-all" {
            findings.push(Finding::new(
                AnalyzerKind::CiRisk,
                Severity::High,
                "ci_permissions_write_all",
                "workflow requests write-all permissions",
                located(relative_path, content, "write-all"),
            ));
        }
    }

    // YAML resolvers disagree on whether a bare `on` key is a string or a
    // boolean; accept both spellings.
    let triggers = doc.as_mapping().and_then(|map| {
        map.iter()
            .find(|(key, _)| key.as_str() == Some("on") || key.as_bool() == Some(true))
            .map(|(_, value)| value)
    });
    if let Some(triggers) = triggers {
        let has_prt = match triggers {
            Value::String(s) => s == "pull_request_target",
            Value::Sequence(seq) => seq
                .iter()
                .any(|v| v.as_str() == Some("pull_request_target")),
            Value::Mapping(map) => map
                .iter()
                .any(|(k, _)| k.as_str() == Some("pull_request_target")),
            _ => false,
        };
        if has_prt {
            findings.push(Finding::new(
                AnalyzerKind::CiRisk,
                Severity::High,
                "ci_pull_request_target",
                "workflow triggers on pull_request_target",
                located(relative_path, content, "pull_request_target"),
            ));
        }
    }

    if let Some(jobs) = doc.get("jobs").and_then(Value::as_mapping) {
        for job in jobs.values() {
            let Some(steps) = job.get("steps").and_then(Value::as_sequence) else {
                continue;
            };
            for step in steps {
                if let Some(run) = step.get("run").and_then(Value::as_str) {
                    if SECRET_ECHO.is_match(run) {
                        findings.push(
                            Finding::new(
                                AnalyzerKind::CiRisk,
                                Severity::Critical,
                                "ci_secret_exposure",
                                "workflow step echoes a secret",
                                located(relative_path, content, run.lines().next().unwrap_or(run)),
                            )
                            .with_evidence(mask_secrets(&truncate_evidence(run, EVIDENCE_MAX))),
                        );
                    }
                    if PIPE_TO_SHELL.is_match(run) {
                        findings.push(
                            Finding::new(
                                AnalyzerKind::CiRisk,
                                Severity::High,
                                "ci_curl_pipe_shell",
                                "workflow step pipes a remote script into a shell",
                                located(relative_path, content, run.lines().next().unwrap_or(run)),
                            )
                            .with_evidence(truncate_evidence(run, EVIDENCE_MAX)),
                        );
                    }
                }

                if let Some(uses) = step.get("uses").and_then(Value::as_str) {
                    findings.extend(uses_findings(relative_path, content, uses));
                }
            }
        }
    }

    findings
}

fn uses_findings(relative_path: &str, content: &str, uses: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    let unpinned = !uses.contains('@') || uses.ends_with("@main") || uses.ends_with("@master");
    if unpinned {
        findings.push(
            Finding::new(
                AnalyzerKind::CiRisk,
                Severity::Medium,
                "ci_unpinned_action",
                "action reference is not pinned to a version",
                located(relative_path, content, uses),
            )
            .with_evidence(truncate_evidence(uses, EVIDENCE_MAX)),
        );
    }

    if !uses.starts_with("actions/") && !SHA_PIN.is_match(uses) {
        findings.push(
            Finding::new(
                AnalyzerKind::CiRisk,
                Severity::Medium,
                "ci_third_party_action",
                "third-party action is not pinned to a commit SHA",
                located(relative_path, content, uses),
            )
            .with_evidence(truncate_evidence(uses, EVIDENCE_MAX)),
        );
    }

    findings
}

fn gitlab_findings(relative_path: &str, content: &str, doc: &Value) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(variables) = doc.get("variables").and_then(Value::as_mapping) {
        for (key, value) in variables {
            let Some(key) = key.as_str() else { continue };
            let Some(value) = value.as_str() else { continue };
            if !value.is_empty() && SECRET_VARIABLE.is_match(key) {
                findings.push(
                    Finding::new(
                        AnalyzerKind::CiRisk,
                        Severity::High,
                        "ci_plaintext_secret",
                        format!("pipeline variable {key} holds a plaintext secret"),
                        located(relative_path, content, key),
                    )
                    .with_evidence(mask_secrets(&truncate_evidence(value, EVIDENCE_MAX))),
                );
            }
        }
    }

    if let Some(map) = doc.as_mapping() {
        for (job_name, job) in map {
            if job_name.as_str() == Some("variables") {
                continue;
            }
            let Some(script) = job.get("script").and_then(Value::as_sequence) else {
                continue;
            };
            for entry in script {
                let Some(command) = entry.as_str() else { continue };
                if PIPE_TO_SHELL.is_match(command) {
                    findings.push(
                        Finding::new(
                            AnalyzerKind::CiRisk,
                            Severity::High,
                            "ci_script_curl_pipe",
                            "pipeline script pipes a remote script into a shell",
                            located(relative_path, content, command),
                        )
                        .with_evidence(truncate_evidence(command, EVIDENCE_MAX)),
                    );
                }
            }
        }
    }

    findings
}
