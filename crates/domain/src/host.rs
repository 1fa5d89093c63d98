//! Host discovery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceId;
use crate::error::{DomainError, Result, require};

/// Payload of a `host.discovered` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostDiscovered {
    pub hostname: String,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub agent_version: String,
    #[serde(default)]
    pub cpu_count: u32,
    #[serde(default)]
    pub socket_count: u32,
    #[serde(default)]
    pub total_memory_mb: u64,
}

/// Payload of a `host.deregistered` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostDeregistered {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payload of a `host.heartbeat` event. The envelope's receive time is the
/// heartbeat time, so the body carries nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostHeartbeat {}

/// A host running the agent. Keyed by the reporting agent id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub agent_id: SourceId,
    pub hostname: String,
    pub ip_addresses: Vec<String>,
    pub os_version: String,
    pub agent_version: String,
    pub cpu_count: u32,
    pub socket_count: u32,
    pub total_memory_mb: u64,
    pub updated_at: DateTime<Utc>,
    /// Latest heartbeat seen for the agent. Rediscovery leaves it untouched.
    #[serde(default)]
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

impl Host {
    /// Builds the host entity from a discovery payload.
    pub fn from_payload(
        agent_id: SourceId,
        payload: HostDiscovered,
        updated_at: DateTime<Utc>,
    ) -> Result<Self> {
        require("hostname", &payload.hostname)?;
        if i64::try_from(payload.total_memory_mb).is_err() {
            return Err(DomainError::OutOfRange {
                field: "total_memory_mb",
                value: payload.total_memory_mb.to_string(),
            });
        }

        Ok(Self {
            agent_id,
            hostname: payload.hostname,
            ip_addresses: payload.ip_addresses,
            os_version: payload.os_version,
            agent_version: payload.agent_version,
            cpu_count: payload.cpu_count,
            socket_count: payload.socket_count,
            total_memory_mb: payload.total_memory_mb,
            updated_at,
            last_heartbeat_at: None,
        })
    }
}
