//! Finding evaluation: suppression, dedup-by-rule scoring, critical-block
//! detection. Pure function of (policy, ordered finding list); bit-for-bit
//! reproducible for the same inputs.

use crate::core::{Finding, Severity};
use crate::policy::model::{Policy, RuleDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_SCORE: i64 = 100;

/// One rule that fired, with every finding that mapped to it. The score is
/// debited once per rule id no matter how many findings share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    pub severity: Severity,
    pub weight: i32,
    pub message: String,
    pub count: usize,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// 0-100 integer; starts at 100 and decreases by triggered weights.
    pub score: u32,
    pub triggered: Vec<TriggeredRule>,
    pub has_critical_block: bool,
    pub critical_block_hit: Vec<String>,
    pub suppressed: Vec<Finding>,
}

pub fn evaluate(policy: &Policy, findings: Vec<Finding>) -> Evaluation {
    let mut score: i64 = MAX_SCORE;
    let mut triggered: Vec<TriggeredRule> = Vec::new();
    let mut triggered_index: HashMap<String, usize> = HashMap::new();
    let mut critical_block_hit: Vec<String> = Vec::new();
    let mut suppressed: Vec<Finding> = Vec::new();

    for finding in findings {
        if is_suppressed(policy, &finding) {
            suppressed.push(finding);
            continue;
        }

        let effective = match policy.rules.get(&finding.rule_id) {
            Some(definition) if !definition.enabled => continue,
            Some(definition) => definition.clone(),
            None => RuleDefinition {
                severity: finding.severity,
                weight: finding.severity.default_weight(),
                message: finding.message.clone(),
                enabled: true,
            },
        };

        if policy.critical_block.contains(&finding.rule_id)
            && !critical_block_hit.contains(&finding.rule_id)
        {
            critical_block_hit.push(finding.rule_id.clone());
        }

        match triggered_index.get(&finding.rule_id) {
            Some(&index) => {
                let entry = &mut triggered[index];
                entry.count += 1;
                entry.findings.push(finding);
            }
            None => {
                score += i64::from(effective.weight);
                triggered_index.insert(finding.rule_id.clone(), triggered.len());
                triggered.push(TriggeredRule {
                    rule_id: finding.rule_id.clone(),
                    severity: effective.severity,
                    weight: effective.weight,
                    message: effective.message,
                    count: 1,
                    findings: vec![finding],
                });
            }
        }
    }

    Evaluation {
        score: score.clamp(0, MAX_SCORE) as u32,
        has_critical_block: !critical_block_hit.is_empty(),
        critical_block_hit,
        triggered,
        suppressed,
    }
}

fn is_suppressed(policy: &Policy, finding: &Finding) -> bool {
    policy.exceptions.iter().any(|exception| {
        exception
            .suppressed_rule_ids
            .iter()
            .any(|rule_id| rule_id == &finding.rule_id)
            && glob_match(&exception.path_pattern, &finding.location.file)
    })
}

/// Path glob with `*` matching within a segment, `**` matching across
/// segments, and `?` matching one character. Case-sensitive.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    match_segments(&pattern_segments, &path_segments)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(&"**") => {
            if match_segments(&pattern[1..], path) {
                return true;
            }
            !path.is_empty() && match_segments(pattern, &path[1..])
        }
        Some(segment) => {
            !path.is_empty()
                && match_segment(segment, path[0])
                && match_segments(&pattern[1..], &path[1..])
        }
    }
}

fn match_segment(pattern: &str, segment: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let segment: Vec<char> = segment.chars().collect();
    match_chars(&pattern, &segment)
}

fn match_chars(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            if match_chars(&pattern[1..], text) {
                return true;
            }
            !text.is_empty() && match_chars(pattern, &text[1..])
        }
        Some('?') => !text.is_empty() && match_chars(&pattern[1..], &text[1..]),
        Some(c) => !text.is_empty() && text[0] == *c && match_chars(&pattern[1..], &text[1..]),
    }
}
