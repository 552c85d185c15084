// ABOUTME: Terminal outcome records handed back to callers.
// ABOUTME: One DeployResult per deploy/rollback and one SetupResult per provisioning run.

use crate::types::ReleaseId;
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;

/// Outcome of a deploy or rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployResult {
    pub success: bool,
    /// `None` only when the operation was rejected before a release id was chosen.
    pub release_id: Option<ReleaseId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DeployResult {
    pub fn succeeded(
        release_id: ReleaseId,
        commit_hash: Option<String>,
        elapsed: Duration,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: true,
            release_id: Some(release_id),
            commit_hash,
            duration_ms: millis(elapsed),
            error: None,
            warnings,
        }
    }

    pub fn failed(
        release_id: Option<ReleaseId>,
        elapsed: Duration,
        error: &dyn Display,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            release_id,
            commit_hash: None,
            duration_ms: millis(elapsed),
            error: Some(error.to_string()),
            warnings,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Outcome of provisioning a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupResult {
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Detected OS id, when detection got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SetupResult {
    pub fn succeeded(os: String, elapsed: Duration, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            duration_ms: millis(elapsed),
            error: None,
            os: Some(os),
            warnings,
        }
    }

    pub fn failed(
        os: Option<String>,
        elapsed: Duration,
        error: &dyn Display,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            duration_ms: millis(elapsed),
            error: Some(error.to_string()),
            os,
            warnings,
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
