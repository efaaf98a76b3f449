//! Install-time execution hooks: lifecycle scripts, build files, container
//! files, and remote-script one-liners anywhere in the source.

use crate::analyzers::{
    line_of_offset, read_text, scan_content, truncate_evidence, Analyzer, PatternRule, ScanInput,
    EVIDENCE_MAX,
};
use crate::core::{AnalyzerKind, Finding, Location, Severity};
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::path::Path;

/// npm lifecycle scripts that run on install, with the severity each one
/// carries. A rule fires at most once per script per manifest.
const NPM_LIFECYCLE: &[(&str, &str, Severity)] = &[
    ("postinstall", "entrypoint_postinstall", Severity::High),
    ("preinstall", "entrypoint_preinstall", Severity::High),
    ("prepare", "entrypoint_prepare", Severity::Medium),
    ("prepublish", "entrypoint_prepublish", Severity::Medium),
];

const INSTALL_SCRIPT_NAMES: &[&str] = &["install.sh", "setup.sh", "bootstrap.sh"];

static SETUP_PY_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            "entrypoint_setup_py",
            Severity::Medium,
            "python package installs build-time code",
            r"setup\s*\(|install_requires",
        ),
        PatternRule::new(
            "entrypoint_cmdclass",
            Severity::High,
            "custom setup command class",
            r"cmdclass\s*=\s*\{",
        ),
    ]
});

static MAKEFILE_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            "entrypoint_makefile_install",
            Severity::Medium,
            "make install target",
            r"(?m)^install:",
        ),
        PatternRule::new(
            "entrypoint_makefile_all",
            Severity::Low,
            "make all target",
            r"(?m)^all:",
        ),
    ]
});

static DOCKERFILE_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            "entrypoint_dockerfile_run",
            Severity::Medium,
            "container build executes commands",
            r"(?m)^RUN ",
        ),
        PatternRule::new(
            "entrypoint_dockerfile_entrypoint",
            Severity::Medium,
            "container entrypoint defined",
            r"(?m)^ENTRYPOINT ",
        ),
    ]
});

/// Checked in every file regardless of its path.
static UNIVERSAL_RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        PatternRule::new(
            "entrypoint_curl_pipe_shell",
            Severity::Critical,
            "remote script piped into a shell via curl",
            r"curl\s+[^\n|]*\|\s*(?:bash|sh|zsh)\b",
        ),
        PatternRule::new(
            "entrypoint_wget_pipe_shell",
            Severity::Critical,
            "remote script piped into a shell via wget",
            r"wget\s+[^\n|]*\|\s*(?:bash|sh|zsh)\b",
        ),
        PatternRule::new(
            "entrypoint_python_inline_exec",
            Severity::Critical,
            "inline python downloads and executes code",
            r#"python3?\s+-c\s+['"][^'"]*(?:urllib|requests)[^'"]*exec"#,
        ),
    ]
});

pub struct EntrypointAnalyzer;

impl EntrypointAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EntrypointAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Analyzer for EntrypointAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Entrypoint
    }

    fn name(&self) -> &'static str {
        "Install entrypoint scanner"
    }

    async fn scan(&self, input: &ScanInput) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for path in &input.files {
            let Some(content) = read_text(path, None).await else {
                continue;
            };
            let relative = input.relative(path);
            let name = file_name(path);

            if name == "package.json" {
                findings.extend(npm_lifecycle_findings(&relative, &content));
            } else if name == "setup.py" {
                findings.extend(scan_content(
                    AnalyzerKind::Entrypoint,
                    &SETUP_PY_RULES,
                    &relative,
                    &content,
                ));
            } else if name.eq_ignore_ascii_case("makefile") {
                findings.extend(scan_content(
                    AnalyzerKind::Entrypoint,
                    &MAKEFILE_RULES,
                    &relative,
                    &content,
                ));
            } else if INSTALL_SCRIPT_NAMES
                .iter()
                .any(|candidate| name.eq_ignore_ascii_case(candidate))
            {
                if !content.trim().is_empty() {
                    findings.push(
                        Finding::new(
                            AnalyzerKind::Entrypoint,
                            Severity::High,
                            "entrypoint_install_script",
                            "installation shell script present",
                            Location::new(relative.as_str()).with_line(1),
                        )
                        .with_evidence(truncate_evidence(
                            content.lines().next().unwrap_or_default(),
                            EVIDENCE_MAX,
                        )),
                    );
                }
            } else if name == "Dockerfile" || name.starts_with("Dockerfile.") {
                findings.extend(scan_content(
                    AnalyzerKind::Entrypoint,
                    &DOCKERFILE_RULES,
                    &relative,
                    &content,
                ));
            }

            findings.extend(scan_content(
                AnalyzerKind::Entrypoint,
                &UNIVERSAL_RULES,
                &relative,
                &content,
            ));
        }
        Ok(findings)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lifecycle hooks declared in a package manifest. Evidence is the script
/// value; the line points at the script key in the raw text.
fn npm_lifecycle_findings(relative_path: &str, content: &str) -> Vec<Finding> {
    let Ok(manifest) = serde_json::from_str::<serde_json::Value>(content) else {
        return Vec::new();
    };
    let Some(scripts) = manifest.get("scripts").and_then(|s| s.as_object()) else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    for (script, rule_id, severity) in NPM_LIFECYCLE {
        let Some(value) = scripts.get(*script).and_then(|v| v.as_str()) else {
            continue;
        };
        let line = content
            .find(&format!("\"{script}\""))
            .map(|offset| line_of_offset(content, offset));

        let mut location = Location::new(relative_path);
        if let Some(line) = line {
            location = location.with_line(line);
        }

        findings.push(
            Finding::new(
                AnalyzerKind::Entrypoint,
                *severity,
                *rule_id,
                format!("npm {script} script runs on install"),
                location,
            )
            .with_evidence(truncate_evidence(value, EVIDENCE_MAX)),
        );
    }
    findings
}
