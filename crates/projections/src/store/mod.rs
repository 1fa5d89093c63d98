//! Read-model storage.
//!
//! A [`ReadModelStore`] hands out [`ReadModelTxn`]s. Everything a projector
//! writes for one envelope, including the ledger row on success, goes through
//! a single transaction, so an envelope is either fully applied or not at all.

mod memory;
mod postgres;

pub use memory::InMemoryReadModelStore;
pub use postgres::PostgresReadModelStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventType, SourceId};
use domain::{Cluster, ChecksResult, Host, SapSystemInstance, SlesSubscription};

use crate::Result;
use crate::ledger::{OutcomeRecord, Subscription, SubscriptionLedger};

/// One open read-model transaction.
///
/// Dropping an open transaction discards its writes.
#[async_trait]
pub trait ReadModelTxn: Send {
    /// Reads the ledger row for the pair and locks it until the transaction
    /// ends. Concurrent transactions for the same pair wait here.
    async fn subscription_for_update(
        &mut self,
        source: &SourceId,
        event_type: &EventType,
    ) -> Result<Option<Subscription>>;

    /// Upserts the ledger row as part of this transaction.
    async fn record_outcome(&mut self, record: &OutcomeRecord) -> Result<Subscription>;

    async fn upsert_host(&mut self, host: &Host) -> Result<()>;

    /// Returns false when no host was stored for the agent.
    async fn delete_host(&mut self, agent_id: &SourceId) -> Result<bool>;

    /// Advances the host's `last_heartbeat_at` to `at` unless it is already
    /// later. Returns false when no host is stored for the agent.
    async fn record_heartbeat(&mut self, agent_id: &SourceId, at: DateTime<Utc>) -> Result<bool>;

    async fn upsert_cluster(&mut self, cluster: &Cluster) -> Result<()>;

    /// Replaces every instance stored for the agent with `instances`.
    async fn replace_sap_system_instances(
        &mut self,
        agent_id: &SourceId,
        instances: &[SapSystemInstance],
    ) -> Result<()>;

    /// Replaces every subscription stored for the agent with `subscriptions`.
    async fn replace_sles_subscriptions(
        &mut self,
        agent_id: &SourceId,
        subscriptions: &[SlesSubscription],
    ) -> Result<()>;

    async fn upsert_checks_result(&mut self, result: &ChecksResult) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Transactional read-model store with query access for the read side.
#[async_trait]
pub trait ReadModelStore: SubscriptionLedger {
    async fn begin(&self) -> Result<Box<dyn ReadModelTxn>>;

    async fn get_host(&self, agent_id: &SourceId) -> Result<Option<Host>>;

    async fn list_hosts(&self) -> Result<Vec<Host>>;

    async fn get_cluster(&self, id: &str) -> Result<Option<Cluster>>;

    async fn list_clusters(&self) -> Result<Vec<Cluster>>;

    async fn sap_system_instances(&self, agent_id: &SourceId) -> Result<Vec<SapSystemInstance>>;

    async fn sles_subscriptions(&self, agent_id: &SourceId) -> Result<Vec<SlesSubscription>>;

    async fn get_checks_result(&self, group_id: &str) -> Result<Option<ChecksResult>>;
}
