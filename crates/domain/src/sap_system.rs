//! SAP system instances discovered on a host.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceId;
use crate::error::{DomainError, Result};

/// Kind of SAP system an instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SapSystemType {
    Application,
    Database,
}

impl SapSystemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SapSystemType::Application => "application",
            SapSystemType::Database => "database",
        }
    }
}

impl std::fmt::Display for SapSystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SapSystemType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "application" => Ok(SapSystemType::Application),
            "database" => Ok(SapSystemType::Database),
            other => Err(DomainError::UnknownVariant {
                kind: "SAP system type",
                value: other.to_string(),
            }),
        }
    }
}

/// One instance as reported inside a `sap_system.discovered` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SapInstanceReport {
    pub sid: String,
    pub instance_number: String,
    pub system_type: SapSystemType,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub sap_hostname: String,
    #[serde(default)]
    pub system_replication: Option<String>,
}

/// Payload of a `sap_system.discovered` event: the complete set of instances
/// currently running on the reporting host. An empty list means none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SapSystemDiscovered {
    #[serde(default)]
    pub instances: Vec<SapInstanceReport>,
}

/// A SAP system instance, keyed by (agent, SID, instance number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SapSystemInstance {
    pub agent_id: SourceId,
    pub sid: String,
    pub instance_number: String,
    pub system_type: SapSystemType,
    pub features: String,
    pub sap_hostname: String,
    pub system_replication: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SapSystemInstance {
    /// Builds the full instance set of a host from a discovery payload.
    ///
    /// Fails on the first invalid or repeated instance; nothing is returned
    /// partially.
    pub fn from_payload(
        agent_id: &SourceId,
        payload: SapSystemDiscovered,
        updated_at: DateTime<Utc>,
    ) -> Result<Vec<Self>> {
        let mut seen = HashSet::with_capacity(payload.instances.len());
        payload
            .instances
            .into_iter()
            .map(|report| {
                validate_sid(&report.sid)?;
                validate_instance_number(&report.instance_number)?;
                if !seen.insert((report.sid.clone(), report.instance_number.clone())) {
                    return Err(DomainError::DuplicateEntry {
                        kind: "SAP instance",
                        key: format!("{}/{}", report.sid, report.instance_number),
                    });
                }
                Ok(Self {
                    agent_id: agent_id.clone(),
                    sid: report.sid,
                    instance_number: report.instance_number,
                    system_type: report.system_type,
                    features: report.features,
                    sap_hostname: report.sap_hostname,
                    system_replication: report.system_replication,
                    updated_at,
                })
            })
            .collect()
    }
}

/// Checks that `sid` is three upper-case alphanumerics starting with a letter.
pub fn validate_sid(sid: &str) -> Result<()> {
    let mut chars = sid.chars();
    let valid = sid.len() == 3
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(DomainError::InvalidSid {
            sid: sid.to_string(),
        })
    }
}

fn validate_instance_number(instance_number: &str) -> Result<()> {
    if instance_number.len() == 2 && instance_number.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(DomainError::InvalidInstanceNumber {
            instance_number: instance_number.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sid: &str, instance_number: &str) -> SapInstanceReport {
        SapInstanceReport {
            sid: sid.to_string(),
            instance_number: instance_number.to_string(),
            system_type: SapSystemType::Database,
            features: "HDB|HDB_WORKER".to_string(),
            sap_hostname: "node01".to_string(),
            system_replication: None,
        }
    }

    #[test]
    fn sid_validation() {
        assert!(validate_sid("PRD").is_ok());
        assert!(validate_sid("HA1").is_ok());
        assert!(validate_sid("1AB").is_err());
        assert!(validate_sid("prd").is_err());
        assert!(validate_sid("PRDX").is_err());
        assert!(validate_sid("").is_err());
    }

    #[test]
    fn instances_from_payload() {
        let agent = SourceId::from("agent-1");
        let payload = SapSystemDiscovered {
            instances: vec![report("PRD", "00"), report("PRD", "01")],
        };

        let instances = SapSystemInstance::from_payload(&agent, payload, Utc::now()).unwrap();

        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|i| i.agent_id == agent));
    }

    #[test]
    fn one_invalid_instance_rejects_the_whole_set() {
        let payload = SapSystemDiscovered {
            instances: vec![report("PRD", "00"), report("PRD", "1")],
        };

        let result = SapSystemInstance::from_payload(&SourceId::from("a"), payload, Utc::now());

        assert_eq!(
            result,
            Err(DomainError::InvalidInstanceNumber {
                instance_number: "1".to_string()
            })
        );
    }

    #[test]
    fn repeated_instance_rejects_the_whole_set() {
        let payload = SapSystemDiscovered {
            instances: vec![report("PRD", "00"), report("PRD", "01"), report("PRD", "00")],
        };

        let result = SapSystemInstance::from_payload(&SourceId::from("a"), payload, Utc::now());

        assert_eq!(
            result,
            Err(DomainError::DuplicateEntry {
                kind: "SAP instance",
                key: "PRD/00".to_string()
            })
        );
    }

    #[test]
    fn same_instance_number_under_different_sids_is_allowed() {
        let payload = SapSystemDiscovered {
            instances: vec![report("PRD", "00"), report("HA1", "00")],
        };

        let instances =
            SapSystemInstance::from_payload(&SourceId::from("a"), payload, Utc::now()).unwrap();

        assert_eq!(instances.len(), 2);
    }

    #[test]
    fn system_type_parses_from_storage() {
        assert_eq!(
            "database".parse::<SapSystemType>().unwrap(),
            SapSystemType::Database
        );
        assert!("mainframe".parse::<SapSystemType>().is_err());
    }
}
