use clap::Subcommand;
use colored::Colorize;
use skillgate_engine::{PolicyLoader, EXIT_SCAN_FAILED};
use std::path::PathBuf;

#[derive(Subcommand, Clone)]
pub enum PolicyCommand {
    /// Load and validate a policy file, resolving inheritance
    Check {
        file: PathBuf,

        #[arg(short, long)]
        verbose: bool,
    },
}

pub fn execute(command: PolicyCommand) -> i32 {
    match command {
        PolicyCommand::Check { file, verbose } => {
            let policy = match PolicyLoader::new().load(&file) {
                Ok(policy) => policy,
                Err(err) => {
                    eprintln!("{} {err}", "invalid:".red().bold());
                    return EXIT_SCAN_FAILED;
                }
            };

            println!(
                "{} {} (version {})",
                "valid:".green().bold(),
                policy.name,
                policy.version
            );
            println!(
                "  thresholds: block <= {}, warn <= {}",
                policy.thresholds.block, policy.thresholds.warn
            );
            println!(
                "  {} rule override(s), {} critical-block rule(s), {} exception(s)",
                policy.rules.len(),
                policy.critical_block.len(),
                policy.exceptions.len()
            );

            if verbose {
                for rule_id in &policy.critical_block {
                    println!("  critical-block: {rule_id}");
                }
                for (rule_id, definition) in &policy.rules {
                    println!(
                        "  rule {rule_id}: {} weight {} {}",
                        definition.severity,
                        definition.weight,
                        if definition.enabled { "" } else { "(disabled)" }
                    );
                }
            }
            0
        }
    }
}
