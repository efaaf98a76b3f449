//! Analyzer execution.
//!
//! The orchestrator runs every registered analyzer concurrently over the
//! same read-only input, isolates per-analyzer failures, and reports results
//! in registration order regardless of finish order.

pub mod orchestrator;

pub use orchestrator::{collect_errors, flatten_findings, AnalyzerOrchestrator, AnalyzerRun};
