//! Dangerous shell commands, suspect URLs, and permission signals in skill
//! documentation (Markdown) files.

use crate::analyzers::{
    has_extension, line_of_offset, read_text, scan_content, truncate_evidence, Analyzer,
    PatternRule, ScanInput, EVIDENCE_MAX,
};
use crate::core::{AnalyzerKind, Finding, Location, Severity};
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Hosts considered ordinary distribution infrastructure. Suffix match so
/// `raw.githubusercontent.com` and `registry.npmjs.org` pass.
const ALLOWED_HOSTS: &[&str] = &["github.com", "githubusercontent.com", "npmjs.org", "pypi.org"];

const SHORTENER_HOSTS: &[&str] = &[
    "bit.ly",
    "tinyurl.com",
    "goo.gl",
    "t.co",
    "is.gd",
    "ow.ly",
    "buff.ly",
    "rb.gy",
];

static RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        // Dangerous shell commands.
        PatternRule::new(
            "skill_rm_rf_root",
            Severity::Critical,
            "recursive delete of root or home directory",
            r#"rm\s+-[rRf]+\s+(?:/|~|\$HOME)(?:[\s'"`]|$)"#,
        ),
        PatternRule::new(
            "skill_rm_recursive",
            Severity::High,
            "recursive file deletion",
            r"rm\s+-[a-zA-Z]*[rR][a-zA-Z]*\b",
        ),
        PatternRule::new(
            "skill_sudo_usage",
            Severity::Medium,
            "privilege escalation via sudo",
            r"\bsudo\s+\S",
        ),
        PatternRule::new(
            "skill_chmod_777",
            Severity::Medium,
            "world-writable permission change",
            r"chmod\s+(?:-[A-Za-z]+\s+)?(?:777|a\+rwx)",
        ),
        PatternRule::new(
            "skill_curl_pipe_shell",
            Severity::Critical,
            "remote script piped into a shell via curl",
            r"curl\s+[^\n|]*\|\s*(?:bash|sh|zsh)\b",
        ),
        PatternRule::new(
            "skill_wget_pipe_shell",
            Severity::Critical,
            "remote script piped into a shell via wget",
            r"wget\s+[^\n|]*\|\s*(?:bash|sh|zsh)\b",
        ),
        PatternRule::new(
            "skill_shell_exec",
            Severity::Medium,
            "inline shell -c invocation",
            r"\b(?:bash|sh|zsh)\s+-c\s+",
        ),
        PatternRule::new(
            "skill_dd_usage",
            Severity::High,
            "raw device copy via dd",
            r"\bdd\s+(?:if|of)=",
        ),
        PatternRule::new(
            "skill_mkfs_usage",
            Severity::Critical,
            "filesystem format command",
            r"\bmkfs(?:\.[a-z0-9]+)?\b",
        ),
        // Suspect URLs beyond the host allowlist (handled separately below):
        PatternRule::new(
            "skill_ip_url",
            Severity::High,
            "download URL addressed by raw IPv4",
            r"https?://\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
        ),
        PatternRule::new(
            "skill_base64_host",
            Severity::High,
            "URL with base64-like host",
            r"https?://[A-Za-z0-9+/=]{50,}",
        ),
        // Permission signals.
        PatternRule::new(
            "skill_home_dir_access",
            Severity::Medium,
            "home directory access",
            r"~/|\$HOME/",
        ),
        PatternRule::new(
            "skill_port_listen",
            Severity::Medium,
            "network bind or listen instruction",
            r"\b(?:listen|bind)\b[^\n]*\b\d{2,5}\b|\bport\s+\d{2,5}\b",
        ),
        PatternRule::new(
            "skill_env_secret_reference",
            Severity::High,
            "secret environment variable reference",
            r"\$(?:API_KEY|SECRET|TOKEN|PASSWORD|CREDENTIAL|AUTH)\b",
        ),
        PatternRule::new(
            "skill_sensitive_path",
            Severity::High,
            "sensitive system path reference",
            r"/etc/passwd|/etc/shadow|/var/log|/proc/",
        ),
    ]
});

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://([^/\s'"<>)\]]+)"#).unwrap());

pub struct SkillDocAnalyzer;

impl SkillDocAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SkillDocAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for SkillDocAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Skill
    }

    fn name(&self) -> &'static str {
        "Skill documentation scanner"
    }

    async fn scan(&self, input: &ScanInput) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for path in input.files.iter().filter(|p| has_extension(p, &["md"])) {
            let Some(content) = read_text(path, None).await else {
                continue;
            };
            let relative = input.relative(path);
            findings.extend(scan_content(
                AnalyzerKind::Skill,
                &RULES,
                &relative,
                &content,
            ));
            findings.extend(url_findings(&relative, &content));
        }
        Ok(findings)
    }
}

fn host_matches(host: &str, candidates: &[&str]) -> bool {
    let host = host
        .split('@')
        .last()
        .unwrap_or(host)
        .split(':')
        .next()
        .unwrap_or(host)
        .to_ascii_lowercase();
    candidates
        .iter()
        .any(|c| host == *c || host.ends_with(&format!(".{c}")))
}

/// Host-allowlist checks that a plain pattern table cannot express.
fn url_findings(relative_path: &str, content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for caps in URL.captures_iter(content) {
        let whole = caps.get(0).unwrap();
        let host = caps.get(1).unwrap().as_str();

        let (rule_id, severity, message) = if host_matches(host, SHORTENER_HOSTS) {
            (
                "skill_url_shortener",
                Severity::High,
                "download behind a URL shortener",
            )
        } else if !host_matches(host, ALLOWED_HOSTS) {
            (
                "skill_unknown_download_host",
                Severity::Medium,
                "URL outside the allowlisted distribution hosts",
            )
        } else {
            continue;
        };

        findings.push(
            Finding::new(
                AnalyzerKind::Skill,
                severity,
                rule_id,
                message,
                Location::new(relative_path).with_line(line_of_offset(content, whole.start())),
            )
            .with_evidence(truncate_evidence(whole.as_str(), EVIDENCE_MAX)),
        );
    }
    findings
}
