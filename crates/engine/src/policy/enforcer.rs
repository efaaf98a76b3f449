//! Terminal decision mapping.

use crate::policy::engine::Evaluation;
use crate::policy::model::Policy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Block,
    Quarantine,
}

impl Decision {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Allow => 0,
            Self::Block => 1,
            Self::Quarantine => 2,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Block => write!(f, "block"),
            Self::Quarantine => write!(f, "quarantine"),
        }
    }
}

/// The enforcer's output: decision, exit code, and derived human text.
#[derive(Debug, Clone)]
pub struct Enforcement {
    pub decision: Decision,
    pub exit_code: i32,
    pub evaluation: Evaluation,
    pub summary: String,
    pub reasons: Vec<String>,
    pub policy_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Map an evaluation to the terminal decision:
/// critical-block hit → block; score at or below the block threshold →
/// block; at or below the warn threshold → quarantine; otherwise allow.
pub fn enforce(policy: &Policy, evaluation: Evaluation) -> Enforcement {
    let thresholds = policy.thresholds;
    let score = evaluation.score;

    let decision = if evaluation.has_critical_block {
        Decision::Block
    } else if score <= thresholds.block {
        Decision::Block
    } else if score <= thresholds.warn {
        Decision::Quarantine
    } else {
        Decision::Allow
    };

    let mut reasons = Vec::new();
    for rule_id in &evaluation.critical_block_hit {
        reasons.push(format!("critical-block rule {rule_id} triggered"));
    }
    match decision {
        Decision::Block if !evaluation.has_critical_block => {
            reasons.push(format!(
                "score {score} is at or below the block threshold {}",
                thresholds.block
            ));
        }
        Decision::Quarantine => {
            reasons.push(format!(
                "score {score} is at or below the warn threshold {}",
                thresholds.warn
            ));
        }
        Decision::Allow => {
            reasons.push(format!(
                "score {score} is above the warn threshold {}",
                thresholds.warn
            ));
        }
        _ => {}
    }
    if !evaluation.suppressed.is_empty() {
        reasons.push(format!(
            "{} finding(s) suppressed by policy exceptions",
            evaluation.suppressed.len()
        ));
    }

    let summary = format!(
        "{decision}: score {score}/100, {} rule(s) triggered",
        evaluation.triggered.len()
    );

    Enforcement {
        decision,
        exit_code: decision.exit_code(),
        evaluation,
        summary,
        reasons,
        policy_name: policy.name.clone(),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::engine::evaluate;
    use crate::core::{AnalyzerKind, Finding, Location, Severity};

    fn eval_with_score(weight: i32) -> Evaluation {
        let mut policy = Policy::default();
        policy.rules.insert(
            "static_probe".to_string(),
            crate::policy::model::RuleDefinition {
                severity: Severity::High,
                weight,
                message: "probe".to_string(),
                enabled: true,
            },
        );
        evaluate(
            &policy,
            vec![Finding::new(
                AnalyzerKind::Static,
                Severity::High,
                "static_probe",
                "probe",
                Location::new("x.js"),
            )],
        )
    }

    #[test]
    fn perfect_score_allows() {
        let enforcement = enforce(&Policy::default(), evaluate(&Policy::default(), vec![]));
        assert_eq!(enforcement.decision, Decision::Allow);
        assert_eq!(enforcement.exit_code, 0);
    }

    #[test]
    fn score_at_warn_threshold_quarantines() {
        // 100 - 30 = 70, exactly the default warn threshold.
        let enforcement = enforce(&Policy::default(), eval_with_score(-30));
        assert_eq!(enforcement.decision, Decision::Quarantine);
        assert_eq!(enforcement.exit_code, 2);
    }

    #[test]
    fn score_at_block_threshold_blocks() {
        let enforcement = enforce(&Policy::default(), eval_with_score(-60));
        assert_eq!(enforcement.decision, Decision::Block);
        assert_eq!(enforcement.exit_code, 1);
    }

    #[test]
    fn critical_block_overrides_good_score() {
        let mut policy = Policy::default();
        policy.critical_block.insert("static_probe".to_string());
        let evaluation = evaluate(
            &policy,
            vec![Finding::new(
                AnalyzerKind::Static,
                Severity::Info,
                "static_probe",
                "probe",
                Location::new("x.js"),
            )],
        );
        // Info weight is zero, so the score alone would allow.
        assert_eq!(evaluation.score, 100);

        let enforcement = enforce(&policy, evaluation);
        assert_eq!(enforcement.decision, Decision::Block);
        assert!(enforcement.reasons[0].contains("critical-block"));
    }

    #[test]
    fn summary_names_the_decision() {
        let enforcement = enforce(&Policy::default(), eval_with_score(-10));
        assert!(enforcement.summary.starts_with("allow:"));
        assert_eq!(enforcement.policy_name, "default");
    }
}
