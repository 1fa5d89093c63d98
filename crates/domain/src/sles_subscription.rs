//! SLES subscriptions registered on a host.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceId;
use crate::error::{DomainError, Result, require};

/// One subscription as reported inside a `subscription.discovered` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlesSubscriptionReport {
    pub identifier: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Payload of a `subscription.discovered` event: the complete subscription
/// set of the reporting host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionDiscovered {
    #[serde(default)]
    pub subscriptions: Vec<SlesSubscriptionReport>,
}

/// A registered product subscription, keyed by (agent, identifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlesSubscription {
    pub agent_id: SourceId,
    pub identifier: String,
    pub version: String,
    pub arch: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SlesSubscription {
    /// Builds the full subscription set of a host from a discovery payload.
    ///
    /// Identifiers must be unique within the set.
    pub fn from_payload(
        agent_id: &SourceId,
        payload: SubscriptionDiscovered,
        updated_at: DateTime<Utc>,
    ) -> Result<Vec<Self>> {
        let mut seen = HashSet::with_capacity(payload.subscriptions.len());
        payload
            .subscriptions
            .into_iter()
            .map(|report| {
                require("identifier", &report.identifier)?;
                if !seen.insert(report.identifier.clone()) {
                    return Err(DomainError::DuplicateEntry {
                        kind: "subscription",
                        key: report.identifier,
                    });
                }
                Ok(Self {
                    agent_id: agent_id.clone(),
                    identifier: report.identifier,
                    version: report.version,
                    arch: report.arch,
                    status: report.status,
                    expires_at: report.expires_at,
                    updated_at,
                })
            })
            .collect()
    }

    /// Returns true when the subscription is registered and not expired at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status.eq_ignore_ascii_case("registered") && self.expires_at.is_none_or(|at| at > now)
    }
}
