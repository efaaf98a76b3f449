//! The serial stage driver: ingest → analyze → evaluate → enforce →
//! assemble. Stages never overlap; the analyze stage fans out internally.

use crate::error::ScanError;
use crate::ingest::{self, IngestOptions};
use crate::oracle::{NullOracle, OsvOracle, VulnerabilityOracle};
use crate::policy::{enforce, evaluate, Enforcement, Policy, PolicyLoader};
use crate::report::Report;
use crate::runner::{collect_errors, flatten_findings, AnalyzerOrchestrator};
use crate::analyzers::ScanInput;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub policy_path: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub git_ref: Option<String>,
    pub timeout: Duration,
    /// Probe the OSV database for dependency vulnerabilities.
    pub osv: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            policy_path: None,
            work_dir: None,
            git_ref: None,
            timeout: ingest::DEFAULT_INGEST_TIMEOUT,
            osv: false,
        }
    }
}

#[derive(Debug)]
pub struct ScanOutcome {
    pub report: Report,
    pub enforcement: Enforcement,
}

impl ScanOutcome {
    pub fn exit_code(&self) -> i32 {
        self.enforcement.exit_code
    }
}

/// Run the full pipeline over one source. Fatal outcomes (ingest failure,
/// policy load failure) surface as `Err` and map to exit code 3; everything
/// else completes with a decision artifact.
pub async fn run_scan(source: &str, options: &ScanOptions) -> Result<ScanOutcome, ScanError> {
    let started = Instant::now();

    let policy = match &options.policy_path {
        Some(path) => PolicyLoader::new().load(path)?,
        None => Policy::default(),
    };
    let policy = Arc::new(policy);

    let ingest_options = IngestOptions {
        work_dir: options.work_dir.clone(),
        timeout: options.timeout,
        git_ref: options.git_ref.clone(),
    };
    let outcome = ingest::ingest(source, &ingest_options).await;
    let context = outcome.context?;
    info!(
        files = context.file_count,
        hash = %context.source_hash,
        duration_ms = outcome.duration_ms,
        "source ingested"
    );

    let oracle: Arc<dyn VulnerabilityOracle> = if options.osv {
        Arc::new(OsvOracle::new())
    } else {
        Arc::new(NullOracle)
    };
    let orchestrator = AnalyzerOrchestrator::with_defaults(oracle);

    let mut input = ScanInput::new(context.root_dir.clone(), context.file_paths());
    input.policy = Some(Arc::clone(&policy));
    let runs = orchestrator.scan(input).await;

    let findings = flatten_findings(&runs);
    let errors = collect_errors(&runs);
    info!(findings = findings.len(), errors = errors.len(), "analysis complete");

    let evaluation = evaluate(&policy, findings);
    let enforcement = enforce(&policy, evaluation);

    let duration_ms = started.elapsed().as_millis() as u64;
    let report = Report::assemble(&context, &enforcement, duration_ms, errors);

    // `context` (and any scratch directory it owns) is released here, after
    // the report no longer needs the file set.
    drop(context);

    Ok(ScanOutcome {
        report,
        enforcement,
    })
}
