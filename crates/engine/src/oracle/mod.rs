//! Out-of-process dependency vulnerability lookup.
//!
//! The dependency analyzer holds an oracle by reference and treats every
//! failure (network, timeout, bad response) as "no vulnerabilities for this
//! dependency". The null implementation backs offline mode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One known vulnerability affecting a concrete package version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub summary: String,
    pub cvss_v3_score: Option<f64>,
}

#[async_trait]
pub trait VulnerabilityOracle: Send + Sync {
    /// Look up known vulnerabilities for an exact package version.
    /// Failures of any kind yield the empty list.
    async fn lookup(&self, ecosystem: &str, name: &str, version: &str) -> Vec<Vulnerability>;

    /// Whether the dependency analyzer should probe at all.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Offline oracle: nothing is ever vulnerable, probing is disabled.
#[derive(Debug, Default)]
pub struct NullOracle;

#[async_trait]
impl VulnerabilityOracle for NullOracle {
    async fn lookup(&self, _ecosystem: &str, _name: &str, _version: &str) -> Vec<Vulnerability> {
        Vec::new()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

pub const OSV_ENDPOINT: &str = "https://api.osv.dev/v1/query";

#[derive(Serialize)]
struct OsvQuery<'a> {
    package: OsvPackage<'a>,
    version: &'a str,
}

#[derive(Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'a str,
}

#[derive(Deserialize)]
struct OsvResponse {
    #[serde(default)]
    vulns: Vec<OsvVuln>,
}

#[derive(Deserialize)]
struct OsvVuln {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    severity: Vec<OsvSeverity>,
    #[serde(default)]
    database_specific: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OsvSeverity {
    #[serde(rename = "type")]
    kind: String,
    score: String,
}

impl OsvVuln {
    fn cvss_v3_score(&self) -> Option<f64> {
        // Numeric scores appear either as a CVSS_V3 severity entry or in
        // the database_specific bag, depending on the advisory source.
        for entry in &self.severity {
            if entry.kind == "CVSS_V3" {
                if let Ok(score) = entry.score.parse::<f64>() {
                    return Some(score);
                }
            }
        }
        self.database_specific
            .as_ref()
            .and_then(|extra| extra.get("cvss_base_score"))
            .and_then(|score| score.as_f64().or_else(|| score.as_str()?.parse().ok()))
    }
}

/// Network-backed oracle querying the OSV database, one request per
/// dependency.
pub struct OsvOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl OsvOracle {
    pub fn new() -> Self {
        Self::with_endpoint(OSV_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for OsvOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VulnerabilityOracle for OsvOracle {
    async fn lookup(&self, ecosystem: &str, name: &str, version: &str) -> Vec<Vulnerability> {
        let query = OsvQuery {
            package: OsvPackage { name, ecosystem },
            version,
        };

        let response = match self.client.post(&self.endpoint).json(&query).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(name, version, error = %err, "osv query failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            debug!(name, version, status = %response.status(), "osv query rejected");
            return Vec::new();
        }

        let parsed: OsvResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(name, version, error = %err, "osv response unreadable");
                return Vec::new();
            }
        };

        parsed
            .vulns
            .into_iter()
            .map(|vuln| Vulnerability {
                cvss_v3_score: vuln.cvss_v3_score(),
                summary: vuln.summary.unwrap_or_else(|| vuln.id.clone()),
                id: vuln.id,
            })
            .collect()
    }
}
