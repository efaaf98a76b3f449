//! Dependency manifest auditing: lockfile discipline and known-vulnerability
//! probing through the oracle.

use crate::analyzers::{Analyzer, ScanInput};
use crate::core::{AnalyzerKind, Finding, Location, Severity};
use crate::oracle::VulnerabilityOracle;
use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestKind {
    Npm,
    Requirements,
    GoMod,
    Cargo,
}

impl ManifestKind {
    fn detect(name: &str) -> Option<Self> {
        match name {
            "package.json" => Some(Self::Npm),
            "requirements.txt" => Some(Self::Requirements),
            "go.mod" => Some(Self::GoMod),
            "Cargo.toml" => Some(Self::Cargo),
            _ => None,
        }
    }

    /// Ecosystem label used by the vulnerability database.
    fn ecosystem(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Requirements => "PyPI",
            Self::GoMod => "Go",
            Self::Cargo => "crates.io",
        }
    }

    /// Lockfile expected to sit next to this manifest, when the ecosystem
    /// has one.
    fn lockfile(&self) -> Option<&'static str> {
        match self {
            Self::Npm => Some("package-lock.json"),
            Self::GoMod => Some("go.sum"),
            Self::Cargo => Some("Cargo.lock"),
            Self::Requirements => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Dependency {
    name: String,
    version: Option<String>,
}

pub struct DependencyAnalyzer {
    oracle: Arc<dyn VulnerabilityOracle>,
}

impl DependencyAnalyzer {
    pub fn new(oracle: Arc<dyn VulnerabilityOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl Analyzer for DependencyAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Dependency
    }

    fn name(&self) -> &'static str {
        "Dependency manifest auditor"
    }

    async fn scan(&self, input: &ScanInput) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for path in &input.files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some(kind) = ManifestKind::detect(&name) else {
                continue;
            };
            let Ok(content) = tokio::fs::read_to_string(path).await else {
                continue;
            };
            let relative = input.relative(path);

            let deps = match parse_manifest(kind, &content) {
                Ok(deps) => deps,
                Err(reason) => {
                    findings.push(
                        Finding::new(
                            AnalyzerKind::Dependency,
                            Severity::Info,
                            "dependency_parse_error",
                            format!("could not parse dependency manifest: {reason}"),
                            Location::new(relative.as_str()),
                        )
                        .with_metadata("manifest", name.clone()),
                    );
                    continue;
                }
            };

            if let Some(lockfile) = kind.lockfile() {
                if !path.parent().map(|d| d.join(lockfile).exists()).unwrap_or(false) {
                    findings.push(
                        Finding::new(
                            AnalyzerKind::Dependency,
                            Severity::Medium,
                            "dependency_no_lockfile",
                            format!("{name} has no {lockfile}; dependency versions are unpinned"),
                            Location::new(relative.as_str()),
                        )
                        .with_metadata("expected_lockfile", lockfile),
                    );
                }
            }

            if self.oracle.is_enabled() {
                findings.extend(self.probe(kind, &relative, &deps).await);
            } else {
                debug!(manifest = %relative, "oracle disabled, skipping vulnerability probe");
            }
        }
        Ok(findings)
    }
}

impl DependencyAnalyzer {
    async fn probe(
        &self,
        kind: ManifestKind,
        relative_path: &str,
        deps: &[Dependency],
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for dep in deps {
            let Some(version) = dep.version.as_deref().and_then(normalize_version) else {
                continue;
            };
            for vuln in self
                .oracle
                .lookup(kind.ecosystem(), &dep.name, &version)
                .await
            {
                let severity = severity_from_cvss(vuln.cvss_v3_score);
                findings.push(
                    Finding::new(
                        AnalyzerKind::Dependency,
                        severity,
                        format!("dependency_vuln_{}", sanitize_id(&vuln.id)),
                        format!("{} {}: {}", dep.name, version, vuln.summary),
                        Location::new(relative_path),
                    )
                    .with_metadata("package", dep.name.clone())
                    .with_metadata("version", version.clone())
                    .with_metadata("advisory", vuln.id.clone()),
                );
            }
        }
        findings
    }
}

fn parse_manifest(kind: ManifestKind, content: &str) -> Result<Vec<Dependency>, String> {
    match kind {
        ManifestKind::Npm => parse_npm(content),
        ManifestKind::Requirements => Ok(parse_requirements(content)),
        ManifestKind::GoMod => Ok(parse_go_mod(content)),
        ManifestKind::Cargo => Ok(parse_cargo(content)),
    }
}

fn parse_npm(content: &str) -> Result<Vec<Dependency>, String> {
    let manifest: serde_json::Value =
        serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut deps = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = manifest.get(section).and_then(|v| v.as_object()) {
            for (name, version) in map {
                deps.push(Dependency {
                    name: name.clone(),
                    version: version.as_str().map(|v| v.to_string()),
                });
            }
        }
    }
    Ok(deps)
}

static REQUIREMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:(?:==|>=|<=|~=|!=|>|<)\s*([^\s;#]+))?")
        .unwrap()
});

fn parse_requirements(content: &str) -> Vec<Dependency> {
    content
        .lines()
        .filter(|line| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#') && !line.starts_with('-')
        })
        .filter_map(|line| {
            let caps = REQUIREMENT_LINE.captures(line)?;
            Some(Dependency {
                name: caps[1].to_string(),
                version: caps.get(2).map(|m| m.as_str().to_string()),
            })
        })
        .collect()
}

static GO_REQUIRE_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^require\s+(\S+)\s+(\S+)").unwrap());
static GO_REQUIRE_ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\S+)\s+(v\S+)").unwrap());

fn parse_go_mod(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut in_block = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("require (") {
            in_block = true;
            continue;
        }
        if in_block {
            if trimmed.starts_with(')') {
                in_block = false;
                continue;
            }
            if let Some(caps) = GO_REQUIRE_ENTRY.captures(trimmed) {
                push_go_dep(&mut deps, &mut seen, &caps[1], &caps[2]);
            }
        } else if let Some(caps) = GO_REQUIRE_SINGLE.captures(trimmed) {
            push_go_dep(&mut deps, &mut seen, &caps[1], &caps[2]);
        }
    }
    deps
}

fn push_go_dep(
    deps: &mut Vec<Dependency>,
    seen: &mut std::collections::HashSet<String>,
    name: &str,
    version: &str,
) {
    if seen.insert(format!("{name}@{version}")) {
        deps.push(Dependency {
            name: name.to_string(),
            version: Some(version.to_string()),
        });
    }
}

static CARGO_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*([A-Za-z0-9_-]+)\s*=\s*"([^"]+)""#).unwrap());
static CARGO_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*([A-Za-z0-9_-]+)\s*=\s*\{[^}]*version\s*=\s*"([^"]+)""#).unwrap()
});

/// Line-oriented read of the `[dependencies]` section: `name = "ver"` and
/// the inline-table form with a `version` key.
fn parse_cargo(content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut in_dependencies = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_dependencies = trimmed == "[dependencies]";
            continue;
        }
        if !in_dependencies || trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some(caps) = CARGO_TABLE.captures(trimmed) {
            deps.push(Dependency {
                name: caps[1].to_string(),
                version: Some(caps[2].to_string()),
            });
        } else if let Some(caps) = CARGO_PLAIN.captures(trimmed) {
            deps.push(Dependency {
                name: caps[1].to_string(),
                version: Some(caps[2].to_string()),
            });
        }
    }
    deps
}

/// Strip range prefixes and reject anything that is not a concrete version.
/// `^4.17.0` is queried as `4.17.0`; wildcards are skipped.
fn normalize_version(spec: &str) -> Option<String> {
    let stripped = spec
        .trim()
        .trim_start_matches(['^', '~', '=', 'v', '>', '<'])
        .trim();
    if stripped.is_empty()
        || stripped.contains('*')
        || stripped.contains(' ')
        || stripped.eq_ignore_ascii_case("latest")
        || stripped.split('.').any(|part| part == "x" || part == "X")
    {
        return None;
    }
    Some(stripped.to_string())
}

fn sanitize_id(id: &str) -> String {
    id.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn severity_from_cvss(score: Option<f64>) -> Severity {
    match score {
        Some(s) if s >= 9.0 => Severity::Critical,
        Some(s) if s >= 7.0 => Severity::High,
        Some(s) if s >= 4.0 => Severity::Medium,
        Some(_) => Severity::Low,
        None => Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{NullOracle, Vulnerability, VulnerabilityOracle};
    use std::fs;
    use std::path::Path;

    struct CannedOracle {
        vulns: Vec<Vulnerability>,
    }

    #[async_trait]
    impl VulnerabilityOracle for CannedOracle {
        async fn lookup(&self, _eco: &str, _name: &str, _version: &str) -> Vec<Vulnerability> {
            self.vulns.clone()
        }
    }

    async fn scan_dir(dir: &Path, oracle: Arc<dyn VulnerabilityOracle>) -> Vec<Finding> {
        let files = crate::ingest::SourceWalker::new()
            .walk(dir)
            .unwrap()
            .into_iter()
            .map(|f| f.absolute_path)
            .collect();
        let input = ScanInput::new(dir, files);
        DependencyAnalyzer::new(oracle).scan(&input).await.unwrap()
    }

    #[tokio::test]
    async fn missing_lockfile_yields_single_medium_finding() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"lodash": "^4.17.21"}}"#,
        )
        .unwrap();

        let findings = scan_dir(dir.path(), Arc::new(NullOracle)).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "dependency_no_lockfile");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn present_lockfile_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"lodash": "4.17.21"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

        let findings = scan_dir(dir.path(), Arc::new(NullOracle)).await;
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn parse_error_is_single_info_finding() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{not json").unwrap();

        let findings = scan_dir(dir.path(), Arc::new(NullOracle)).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "dependency_parse_error");
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn oracle_vulns_map_to_cvss_severity() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"left-pad": "^1.0.0"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

        let oracle = CannedOracle {
            vulns: vec![Vulnerability {
                id: "GHSA-abcd-1234".to_string(),
                summary: "prototype pollution".to_string(),
                cvss_v3_score: Some(9.8),
            }],
        };
        let findings = scan_dir(dir.path(), Arc::new(oracle)).await;
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "dependency_vuln_ghsa_abcd_1234");
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn wildcard_versions_are_not_probed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies": {"left-pad": "*"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("package-lock.json"), "{}").unwrap();

        let oracle = CannedOracle {
            vulns: vec![Vulnerability {
                id: "GHSA-x".to_string(),
                summary: "any".to_string(),
                cvss_v3_score: None,
            }],
        };
        let findings = scan_dir(dir.path(), Arc::new(oracle)).await;
        assert!(findings.is_empty());
    }

    #[test]
    fn parses_requirements_lines() {
        let deps = parse_requirements("# comment\nflask==2.0.1\nrequests>=2.28\nclick\n");
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "flask");
        assert_eq!(deps[0].version.as_deref(), Some("2.0.1"));
        assert_eq!(deps[2].version, None);
    }

    #[test]
    fn parses_go_mod_blocks_and_single_lines() {
        let content = "module example.com/m\n\nrequire github.com/pkg/errors v0.9.1\n\nrequire (\n\tgolang.org/x/net v0.7.0\n\tgolang.org/x/net v0.7.0\n)\n";
        let deps = parse_go_mod(content);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[1].name, "golang.org/x/net");
    }

    #[test]
    fn parses_cargo_dependency_section_only() {
        let content = "[package]\nname = \"demo\"\n\n[dependencies]\nserde = \"1.0\"\ntokio = { version = \"1.38\", features = [\"full\"] }\n\n[dev-dependencies]\ntempfile = \"3.10\"\n";
        let deps = parse_cargo(content);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0], Dependency { name: "serde".into(), version: Some("1.0".into()) });
        assert_eq!(deps[1].version.as_deref(), Some("1.38"));
    }

    #[test]
    fn version_normalization_strips_ranges_and_skips_wildcards() {
        assert_eq!(normalize_version("^4.17.0").as_deref(), Some("4.17.0"));
        assert_eq!(normalize_version("~1.2.3").as_deref(), Some("1.2.3"));
        assert_eq!(normalize_version("v0.9.1").as_deref(), Some("0.9.1"));
        assert_eq!(normalize_version("*"), None);
        assert_eq!(normalize_version("1.x"), None);
        assert_eq!(normalize_version("latest"), None);
    }

    #[test]
    fn cvss_mapping_matches_thresholds() {
        assert_eq!(severity_from_cvss(Some(9.0)), Severity::Critical);
        assert_eq!(severity_from_cvss(Some(8.1)), Severity::High);
        assert_eq!(severity_from_cvss(Some(4.0)), Severity::Medium);
        assert_eq!(severity_from_cvss(Some(2.0)), Severity::Low);
        assert_eq!(severity_from_cvss(None), Severity::Info);
    }
}
