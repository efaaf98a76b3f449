//! Dangerous-API, obfuscation, and credential-access patterns in code files.

use crate::analyzers::{
    has_extension, line_of_offset, read_text, scan_content, Analyzer, PatternRule, ScanInput,
};
use crate::core::{AnalyzerKind, Finding, Location, Severity};
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::path::Path;

const CODE_EXTENSIONS: &[&str] = &["js", "ts", "jsx", "tsx", "py", "rb", "sh", "bash", "go", "rs"];

/// Lines at or above this length are reported as likely obfuscation.
const LONG_LINE_THRESHOLD: usize = 500;

static RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        // Dangerous APIs. The eval/exec shapes are deliberately broad and
        // also hit method names ending in eval/exec.
        PatternRule::new(
            "static_eval_usage",
            Severity::High,
            "dynamic code evaluation via eval",
            r"eval\s*\(",
        ),
        PatternRule::new(
            "static_exec_usage",
            Severity::High,
            "dynamic code execution via exec",
            r"exec\s*\(",
        ),
        PatternRule::new(
            "static_child_process",
            Severity::High,
            "child_process module usage",
            r#"require\s*\(\s*['"]child_process['"]\s*\)|from\s+['"]child_process['"]|import\s+['"]child_process['"]"#,
        ),
        PatternRule::new(
            "static_process_spawn",
            Severity::High,
            "subprocess spawn call",
            r"\b(?:spawn|spawnSync|execSync|execFileSync)\s*\(",
        ),
        PatternRule::new(
            "static_fs_destructive",
            Severity::Medium,
            "destructive filesystem call",
            r"\b(?:writeFileSync|unlinkSync|rmSync|rmdirSync|rimraf)\s*\(",
        ),
        PatternRule::new(
            "static_network_call",
            Severity::Low,
            "outbound network request",
            r"\b(?:fetch|axios|XMLHttpRequest)\s*[.(]|\bhttps?\.request\s*\(|\burllib\.request\b|\brequests\.(?:get|post)\s*\(",
        ),
        // Obfuscation.
        PatternRule::new(
            "static_base64_decode",
            Severity::Medium,
            "base64 decode primitive",
            r#"\batob\s*\(|\bb64decode\s*\(|Buffer\.from\s*\([^)\n]*,\s*['"]base64['"]"#,
        ),
        PatternRule::new(
            "static_charcode_obfuscation",
            Severity::High,
            "character-code string construction",
            r"String\.fromCharCode\s*\((?:\s*\d+\s*,){10,}",
        ),
        PatternRule::new(
            "static_hex_escape_obfuscation",
            Severity::Medium,
            "long run of hex escapes",
            r"(?:\\x[0-9a-fA-F]{2}){11,}",
        ),
        // Credential access.
        PatternRule::new(
            "static_ssh_key_access",
            Severity::Critical,
            "SSH key material access",
            r"~/\.ssh|id_rsa|authorized_keys",
        )
        .masked(),
        PatternRule::new(
            "static_aws_credentials_access",
            Severity::Critical,
            "AWS credentials directory access",
            r"~/\.aws",
        )
        .masked(),
        PatternRule::new(
            "static_env_file_access",
            Severity::High,
            "dotenv file access",
            r#"[^A-Za-z0-9_]\.env\b"#,
        )
        .masked(),
        PatternRule::new(
            "static_browser_storage_access",
            Severity::High,
            "browser credential store access",
            r"\blocalStorage\b|\bsessionStorage\b|document\.cookie",
        )
        .masked(),
        PatternRule::new(
            "static_keychain_access",
            Severity::High,
            "OS keychain access",
            r"\bkeychain\b|\bkeyring\b|security\s+find-generic-password",
        )
        .masked(),
    ]
});

pub struct StaticCodeAnalyzer;

impl StaticCodeAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn in_scope(path: &Path) -> bool {
        has_extension(path, CODE_EXTENSIONS)
    }
}

impl Default for StaticCodeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for StaticCodeAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Static
    }

    fn name(&self) -> &'static str {
        "Static code pattern scanner"
    }

    async fn scan(&self, input: &ScanInput) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for path in input.files.iter().filter(|p| Self::in_scope(p)) {
            let Some(content) = read_text(path, None).await else {
                continue;
            };
            let relative = input.relative(path);
            findings.extend(scan_content(
                AnalyzerKind::Static,
                &RULES,
                &relative,
                &content,
            ));
            findings.extend(long_lines(&relative, &content));
        }
        Ok(findings)
    }
}

fn long_lines(relative_path: &str, content: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut offset = 0usize;
    for line in content.split('\n') {
        if line.chars().count() >= LONG_LINE_THRESHOLD {
            findings.push(
                Finding::new(
                    AnalyzerKind::Static,
                    Severity::Low,
                    "static_long_line",
                    "very long line, possible packed payload",
                    Location::new(relative_path).with_line(line_of_offset(content, offset)),
                )
                .with_evidence(crate::analyzers::truncate_evidence(
                    line,
                    crate::analyzers::EVIDENCE_MAX,
                )),
            );
        }
        offset += line.len() + 1;
    }
    findings
}
