//! Console rendering of a scan outcome. Evidence reaches the terminal only
//! in its masked form; the engine guarantees that by the time findings are
//! in the artifact.

use colored::Colorize;
use skillgate_engine::{Decision, Enforcement, Report, Severity};

fn severity_tag(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Critical => "CRITICAL".red().bold(),
        Severity::High => "HIGH".red(),
        Severity::Medium => "MEDIUM".yellow(),
        Severity::Low => "LOW".cyan(),
        Severity::Info => "INFO".dimmed(),
    }
}

fn decision_banner(decision: Decision) -> colored::ColoredString {
    match decision {
        Decision::Allow => "ALLOW".green().bold(),
        Decision::Block => "BLOCK".red().bold(),
        Decision::Quarantine => "QUARANTINE".yellow().bold(),
    }
}

pub fn render_console(report: &Report, enforcement: &Enforcement, verbose: bool) {
    println!();
    println!(
        "{} {} (score {}/100, policy {})",
        decision_banner(report.decision),
        report.source.path,
        report.score,
        report.policy_name
    );

    for reason in &enforcement.reasons {
        println!("  {}", reason.dimmed());
    }

    let summary = &report.summary;
    println!(
        "  findings: {} critical, {} high, {} medium, {} low, {} info",
        summary.critical, summary.high, summary.medium, summary.low, summary.info
    );

    if !report.critical_block_rules.is_empty() {
        println!(
            "  critical-block: {}",
            report.critical_block_rules.join(", ").red()
        );
    }

    if !report.findings.is_empty() {
        println!();
        for finding in &report.findings {
            let location = match finding.location.line {
                Some(line) => format!("{}:{line}", finding.location.file),
                None => finding.location.file.clone(),
            };
            println!(
                "  [{}] {} {}: {}",
                severity_tag(finding.severity),
                finding.rule.bold(),
                location,
                finding.message
            );
            if verbose {
                if let Some(evidence) = &finding.evidence {
                    println!("      evidence: {}", evidence.dimmed());
                }
            }
        }
    }

    if !report.errors.is_empty() {
        println!();
        for error in &report.errors {
            println!("  {} {error}", "analyzer error:".yellow());
        }
    }

    println!();
    println!(
        "  source hash {} ({} ms)",
        &report.source.hash[..12.min(report.source.hash.len())],
        report.duration
    );
}
