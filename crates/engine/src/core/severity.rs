use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Info => write!(f, "info"),
        }
    }
}

impl Severity {
    /// Score weight applied when no policy rule overrides a finding.
    pub fn default_weight(&self) -> i32 {
        match self {
            Self::Critical => -50,
            Self::High => -20,
            Self::Medium => -10,
            Self::Low => -5,
            Self::Info => 0,
        }
    }
}

/// Producer tag carried by every finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalyzerKind {
    Secret,
    Static,
    Skill,
    Entrypoint,
    Dependency,
    CiRisk,
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret => write!(f, "secret"),
            Self::Static => write!(f, "static"),
            Self::Skill => write!(f, "skill"),
            Self::Entrypoint => write!(f, "entrypoint"),
            Self::Dependency => write!(f, "dependency"),
            Self::CiRisk => write!(f, "ci-risk"),
        }
    }
}
