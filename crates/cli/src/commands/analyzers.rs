use clap::Args;
use skillgate_engine::{AnalyzerOrchestrator, NullOracle};
use std::sync::Arc;

#[derive(Args, Clone)]
pub struct AnalyzersArgs {}

pub fn execute(_args: AnalyzersArgs) -> i32 {
    let orchestrator = AnalyzerOrchestrator::with_defaults(Arc::new(NullOracle));
    for (kind, name) in orchestrator.analyzers() {
        println!("{:<12} {name}", kind.to_string());
    }
    0
}
