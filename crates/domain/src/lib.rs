//! Domain layer for the agent fact pipeline.
//!
//! Each module pairs the payload an agent reports with the read-model entity
//! built from it:
//! - [`host`]: host discovery, heartbeats and deregistration
//! - [`cluster`]: HA cluster discovery
//! - [`sap_system`]: SAP system instances running on a host
//! - [`sles_subscription`]: SLES subscriptions of a host
//! - [`checks`]: check execution results for a cluster
//!
//! Payload validation lives here so that every storage backend enforces the
//! same rules.

pub mod checks;
pub mod cluster;
pub mod error;
pub mod event_types;
pub mod host;
pub mod sap_system;
pub mod sles_subscription;

pub use checks::{CheckHealth, CheckResultEntry, ChecksResult, ChecksResultReported};
pub use cluster::{Cluster, ClusterDiscovered, ClusterType};
pub use common::{EventType, SourceId};
pub use error::{DomainError, Result};
pub use host::{Host, HostDeregistered, HostDiscovered, HostHeartbeat};
pub use sap_system::{SapInstanceReport, SapSystemDiscovered, SapSystemInstance, SapSystemType};
pub use sles_subscription::{SlesSubscription, SlesSubscriptionReport, SubscriptionDiscovered};
