use crate::core::{AnalyzerKind, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a finding was detected, relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Location {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

/// Atomic detection record produced by an analyzer.
///
/// `rule_id` is the policy join key, shaped `{analyzer}_{name}` and unique
/// within its analyzer. Evidence attached to credential-category rules must
/// already be masked by the producing analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub analyzer: AnalyzerKind,

    pub severity: Severity,

    pub rule_id: String,

    pub message: String,

    pub location: Location,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Finding {
    pub fn new(
        analyzer: AnalyzerKind,
        severity: Severity,
        rule_id: impl Into<String>,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            analyzer,
            severity,
            rule_id: rule_id.into(),
            message: message.into(),
            location,
            evidence: None,
            metadata: None,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}
