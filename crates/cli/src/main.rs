use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{analyzers::AnalyzersArgs, policy::PolicyCommand, scan::ScanArgs};

#[derive(Parser)]
#[command(name = "skillgate")]
#[command(about = "Pre-installation security auditor for agent skill packages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a skill source and emit a decision
    Scan(ScanArgs),

    /// Inspect and validate policy files
    Policy {
        #[command(subcommand)]
        subcommand: PolicyCommand,
    },

    /// List the registered analyzers
    Analyzers(AnalyzersArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Scan(args) => commands::scan::execute(args).await,
        Commands::Policy { subcommand } => commands::policy::execute(subcommand),
        Commands::Analyzers(args) => commands::analyzers::execute(args),
    };
    std::process::exit(exit_code);
}
