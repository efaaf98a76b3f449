use crate::output;
use clap::{Args, ValueEnum};
use skillgate_engine::{run_scan, ScanOptions, EXIT_SCAN_FAILED};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    Console,
    Json,
}

#[derive(Args, Clone)]
pub struct ScanArgs {
    /// Local directory, VCS URL, or archive path
    pub source: String,

    /// Policy file (YAML); the built-in default policy when omitted
    #[arg(short, long)]
    pub policy: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// Write the JSON decision artifact to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Branch, tag, or commit to check out for VCS sources
    #[arg(long)]
    pub git_ref: Option<String>,

    /// Parent directory for scratch checkouts
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Probe the OSV database for dependency vulnerabilities
    #[arg(long)]
    pub osv: bool,

    /// Ingest timeout in seconds for clones and extraction
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn execute(args: ScanArgs) -> i32 {
    let options = ScanOptions {
        policy_path: args.policy.clone(),
        work_dir: args.work_dir.clone(),
        git_ref: args.git_ref.clone(),
        timeout: Duration::from_secs(args.timeout),
        osv: args.osv,
    };

    let outcome = match run_scan(&args.source, &options).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("scan failed: {err}");
            return EXIT_SCAN_FAILED;
        }
    };

    let pretty = !args.compact;
    if let Some(path) = &args.output {
        if let Err(err) = outcome.report.write(Some(path), pretty) {
            eprintln!("scan failed: {err}");
            return EXIT_SCAN_FAILED;
        }
    }

    match args.format {
        OutputFormat::Json => {
            if let Err(err) = outcome.report.write(None, pretty) {
                eprintln!("scan failed: {err}");
                return EXIT_SCAN_FAILED;
            }
        }
        OutputFormat::Console => {
            output::render_console(&outcome.report, &outcome.enforcement, args.verbose);
        }
    }

    outcome.exit_code()
}
