use crate::analyzers::{
    Analyzer, CiRiskAnalyzer, DependencyAnalyzer, EntrypointAnalyzer, ScanInput, SecretAnalyzer,
    SkillDocAnalyzer, StaticCodeAnalyzer,
};
use crate::core::{AnalyzerKind, Finding};
use crate::oracle::VulnerabilityOracle;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What one analyzer produced, failure included. A failed analyzer has an
/// empty finding list and a non-empty error; it never aborts the run.
#[derive(Debug, Clone)]
pub struct AnalyzerRun {
    pub kind: AnalyzerKind,
    pub findings: Vec<Finding>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Holds the registered analyzer set. Registration order is the canonical
/// order for outputs: results come back in it no matter which analyzer
/// finishes first, and the flat finding list concatenates in it.
pub struct AnalyzerOrchestrator {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerOrchestrator {
    pub fn new() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    /// The six analyzers in canonical order.
    pub fn with_defaults(oracle: Arc<dyn VulnerabilityOracle>) -> Self {
        Self::new()
            .register(SecretAnalyzer::new())
            .register(StaticCodeAnalyzer::new())
            .register(SkillDocAnalyzer::new())
            .register(EntrypointAnalyzer::new())
            .register(DependencyAnalyzer::new(oracle))
            .register(CiRiskAnalyzer::new())
    }

    pub fn register<A: Analyzer + 'static>(mut self, analyzer: A) -> Self {
        self.analyzers.push(Arc::new(analyzer));
        self
    }

    pub fn analyzers(&self) -> impl Iterator<Item = (AnalyzerKind, &'static str)> + '_ {
        self.analyzers.iter().map(|a| (a.kind(), a.name()))
    }

    /// Run every analyzer concurrently over the same read-only input and
    /// await them all. One analyzer's failure never touches the others.
    pub async fn scan(&self, input: ScanInput) -> Vec<AnalyzerRun> {
        let input = Arc::new(input);

        let handles: Vec<_> = self
            .analyzers
            .iter()
            .map(|analyzer| {
                let analyzer = Arc::clone(analyzer);
                let input = Arc::clone(&input);
                tokio::spawn(async move {
                    let kind = analyzer.kind();
                    let started = Instant::now();
                    let outcome = analyzer.scan(&input).await;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    match outcome {
                        Ok(findings) => {
                            debug!(%kind, count = findings.len(), duration_ms, "analyzer finished");
                            AnalyzerRun {
                                kind,
                                findings,
                                duration_ms,
                                error: None,
                            }
                        }
                        Err(err) => {
                            warn!(%kind, error = %err, "analyzer failed");
                            AnalyzerRun {
                                kind,
                                findings: Vec::new(),
                                duration_ms,
                                error: Some(err.to_string()),
                            }
                        }
                    }
                })
            })
            .collect();

        let mut runs = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(run) => runs.push(run),
                // A panicked task still yields a result record in order.
                Err(err) => runs.push(AnalyzerRun {
                    kind: self.analyzers[index].kind(),
                    findings: Vec::new(),
                    duration_ms: 0,
                    error: Some(format!("analyzer task aborted: {err}")),
                }),
            }
        }
        runs
    }
}

impl Default for AnalyzerOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten per-analyzer results into the finding list handed to the policy
/// engine: orchestrator order between analyzers, output order within one.
pub fn flatten_findings(runs: &[AnalyzerRun]) -> Vec<Finding> {
    runs.iter().flat_map(|run| run.findings.clone()).collect()
}

/// Collect the per-analyzer error strings for the artifact.
pub fn collect_errors(runs: &[AnalyzerRun]) -> Vec<String> {
    runs.iter()
        .filter_map(|run| {
            run.error
                .as_ref()
                .map(|error| format!("{}: {}", run.kind, error))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Location, Severity};
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct FixedAnalyzer {
        kind: AnalyzerKind,
        rule: &'static str,
    }

    #[async_trait]
    impl Analyzer for FixedAnalyzer {
        fn kind(&self) -> AnalyzerKind {
            self.kind
        }

        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn scan(&self, _input: &ScanInput) -> anyhow::Result<Vec<Finding>> {
            Ok(vec![Finding::new(
                self.kind,
                Severity::Low,
                self.rule,
                "fixed finding",
                Location::new("x.txt"),
            )])
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        fn kind(&self) -> AnalyzerKind {
            AnalyzerKind::Static
        }

        fn name(&self) -> &'static str {
            "failing"
        }

        async fn scan(&self, _input: &ScanInput) -> anyhow::Result<Vec<Finding>> {
            Err(anyhow!("boom"))
        }
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl Analyzer for SlowAnalyzer {
        fn kind(&self) -> AnalyzerKind {
            AnalyzerKind::Secret
        }

        fn name(&self) -> &'static str {
            "slow"
        }

        async fn scan(&self, _input: &ScanInput) -> anyhow::Result<Vec<Finding>> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(vec![Finding::new(
                AnalyzerKind::Secret,
                Severity::Info,
                "secret_slow",
                "slow finding",
                Location::new("y.txt"),
            )])
        }
    }

    fn empty_input() -> ScanInput {
        ScanInput::new("/tmp", Vec::new())
    }

    #[tokio::test]
    async fn results_come_back_in_registration_order() {
        let orchestrator = AnalyzerOrchestrator::new()
            .register(SlowAnalyzer)
            .register(FixedAnalyzer {
                kind: AnalyzerKind::Skill,
                rule: "skill_fixed",
            });

        let runs = orchestrator.scan(empty_input()).await;
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].kind, AnalyzerKind::Secret);
        assert_eq!(runs[1].kind, AnalyzerKind::Skill);

        let flat = flatten_findings(&runs);
        assert_eq!(flat[0].rule_id, "secret_slow");
        assert_eq!(flat[1].rule_id, "skill_fixed");
    }

    #[tokio::test]
    async fn one_failure_is_isolated() {
        let orchestrator = AnalyzerOrchestrator::new()
            .register(FixedAnalyzer {
                kind: AnalyzerKind::Skill,
                rule: "skill_fixed",
            })
            .register(FailingAnalyzer)
            .register(FixedAnalyzer {
                kind: AnalyzerKind::Entrypoint,
                rule: "entrypoint_fixed",
            });

        let runs = orchestrator.scan(empty_input()).await;
        assert_eq!(runs.len(), 3);

        assert!(runs[0].error.is_none());
        assert_eq!(runs[0].findings.len(), 1);

        assert!(runs[1].error.as_deref().unwrap().contains("boom"));
        assert!(runs[1].findings.is_empty());

        assert!(runs[2].error.is_none());
        assert_eq!(runs[2].findings.len(), 1);

        let errors = collect_errors(&runs);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("static:"));
    }

    #[tokio::test]
    async fn default_registry_has_six_analyzers_in_order() {
        let orchestrator =
            AnalyzerOrchestrator::with_defaults(Arc::new(crate::oracle::NullOracle));
        let kinds: Vec<_> = orchestrator.analyzers().map(|(kind, _)| kind).collect();
        assert_eq!(
            kinds,
            vec![
                AnalyzerKind::Secret,
                AnalyzerKind::Static,
                AnalyzerKind::Skill,
                AnalyzerKind::Entrypoint,
                AnalyzerKind::Dependency,
                AnalyzerKind::CiRisk,
            ]
        );
    }
}
