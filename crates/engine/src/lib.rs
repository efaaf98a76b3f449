//! skillgate-engine — pre-installation security auditing for agent skill
//! packages.
//!
//! The pipeline normalizes a heterogeneous source (local directory, remote
//! repository, archive) into a content-addressed file set, fans out over a
//! set of independent pattern analyzers, evaluates the resulting findings
//! against a declarative policy, and assembles a reproducible decision
//! artifact. Skill code is never executed.

pub mod analyzers;
pub mod core;
pub mod error;
pub mod ingest;
pub mod oracle;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod runner;

pub use analyzers::{Analyzer, ScanInput};
pub use core::{mask_secrets, AnalyzerKind, Finding, Location, Severity};
pub use error::{PolicyError, ScanError, EXIT_SCAN_FAILED};
pub use ingest::{IngestContext, IngestOptions, SourceDescriptor, SourceKind, SourceWalker};
pub use oracle::{NullOracle, OsvOracle, Vulnerability, VulnerabilityOracle};
pub use pipeline::{run_scan, ScanOptions, ScanOutcome};
pub use policy::{
    enforce, evaluate, Decision, Enforcement, Evaluation, Policy, PolicyLoader, TriggeredRule,
};
pub use report::{Report, ReportFinding, SeveritySummary};
pub use runner::{AnalyzerOrchestrator, AnalyzerRun};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
