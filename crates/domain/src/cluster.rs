//! HA cluster discovery.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceId;
use crate::error::{DomainError, Result, require};
use crate::sap_system::validate_sid;

/// Detected cluster topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    HanaScaleUp,
    HanaScaleOut,
    #[default]
    Unknown,
}

impl ClusterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterType::HanaScaleUp => "hana_scale_up",
            ClusterType::HanaScaleOut => "hana_scale_out",
            ClusterType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ClusterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hana_scale_up" => Ok(ClusterType::HanaScaleUp),
            "hana_scale_out" => Ok(ClusterType::HanaScaleOut),
            "unknown" => Ok(ClusterType::Unknown),
            other => Err(DomainError::UnknownVariant {
                kind: "cluster type",
                value: other.to_string(),
            }),
        }
    }
}

/// Payload of a `cluster.discovered` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDiscovered {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cluster_type: ClusterType,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub resources_number: u32,
    #[serde(default)]
    pub hosts_number: u32,
}

/// A cluster, keyed by its cluster id. Every node reports the same cluster,
/// so `reported_by` holds whichever agent reported it last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub cluster_type: ClusterType,
    pub sid: Option<String>,
    pub nodes: Vec<String>,
    pub resources_number: u32,
    pub hosts_number: u32,
    pub reported_by: SourceId,
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    /// Builds the cluster entity from a discovery payload.
    pub fn from_payload(
        reported_by: SourceId,
        payload: ClusterDiscovered,
        updated_at: DateTime<Utc>,
    ) -> Result<Self> {
        require("id", &payload.id)?;
        if let Some(ref sid) = payload.sid {
            validate_sid(sid)?;
        }

        Ok(Self {
            id: payload.id,
            name: payload.name,
            cluster_type: payload.cluster_type,
            sid: payload.sid,
            nodes: payload.nodes,
            resources_number: payload.resources_number,
            hosts_number: payload.hosts_number,
            reported_by,
            updated_at,
        })
    }
}
