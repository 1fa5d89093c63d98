//! Check execution results for a cluster.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceId;
use crate::error::{DomainError, Result, require};

/// Outcome of a single check, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckHealth {
    Skipped,
    Passing,
    Warning,
    Critical,
}

impl CheckHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckHealth::Skipped => "skipped",
            CheckHealth::Passing => "passing",
            CheckHealth::Warning => "warning",
            CheckHealth::Critical => "critical",
        }
    }
}

impl std::fmt::Display for CheckHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckHealth {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skipped" => Ok(CheckHealth::Skipped),
            "passing" => Ok(CheckHealth::Passing),
            "warning" => Ok(CheckHealth::Warning),
            "critical" => Ok(CheckHealth::Critical),
            other => Err(DomainError::UnknownVariant {
                kind: "check health",
                value: other.to_string(),
            }),
        }
    }
}

/// One check result on one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResultEntry {
    pub check_id: String,
    pub agent_id: SourceId,
    pub result: CheckHealth,
}

/// Payload of a `checks_result.reported` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksResultReported {
    pub group_id: String,
    #[serde(default)]
    pub results: Vec<CheckResultEntry>,
}

/// Latest checks execution for a group (cluster).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksResult {
    pub group_id: String,
    /// Worst individual result.
    pub health: CheckHealth,
    pub results: Vec<CheckResultEntry>,
    pub reported_by: SourceId,
    pub updated_at: DateTime<Utc>,
}

impl ChecksResult {
    /// Builds the checks result entity, deriving the overall health.
    pub fn from_payload(
        reported_by: SourceId,
        payload: ChecksResultReported,
        updated_at: DateTime<Utc>,
    ) -> Result<Self> {
        require("group_id", &payload.group_id)?;
        for entry in &payload.results {
            require("check_id", &entry.check_id)?;
        }

        let health = payload
            .results
            .iter()
            .map(|r| r.result)
            .max()
            .ok_or_else(|| DomainError::EmptyChecksResult {
                group_id: payload.group_id.clone(),
            })?;

        Ok(Self {
            group_id: payload.group_id,
            health,
            results: payload.results,
            reported_by,
            updated_at,
        })
    }
}
