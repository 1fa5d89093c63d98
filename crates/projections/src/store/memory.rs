use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventType, SourceId};
use domain::{ChecksResult, Cluster, Host, SapSystemInstance, SlesSubscription};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{ReadModelStore, ReadModelTxn};
use crate::ledger::{OutcomeRecord, Subscription, SubscriptionLedger};
use crate::{ProjectionError, Result};

#[derive(Debug, Clone, Default)]
struct ReadModelState {
    subscriptions: BTreeMap<(SourceId, EventType), Subscription>,
    hosts: BTreeMap<SourceId, Host>,
    clusters: BTreeMap<String, Cluster>,
    sap_system_instances: BTreeMap<SourceId, Vec<SapSystemInstance>>,
    sles_subscriptions: BTreeMap<SourceId, Vec<SlesSubscription>>,
    checks_results: BTreeMap<String, ChecksResult>,
}

impl ReadModelState {
    fn upsert_subscription(&mut self, record: &OutcomeRecord) -> Subscription {
        let key = (record.source.clone(), record.event_type.clone());
        let sub = self
            .subscriptions
            .entry(key)
            .and_modify(|sub| sub.apply(record))
            .or_insert_with(|| Subscription::from_record(record));
        sub.clone()
    }
}

/// In-memory read models for tests and database-less runs.
///
/// Transactions hold the store's mutex from `begin` until commit, rollback
/// or drop and work on a staged copy of the state, so they are serialized
/// and a rolled-back transaction leaves nothing behind.
#[derive(Clone, Default)]
pub struct InMemoryReadModelStore {
    state: Arc<Mutex<ReadModelState>>,
}

impl InMemoryReadModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct InMemoryTxn {
    guard: Option<OwnedMutexGuard<ReadModelState>>,
    staged: ReadModelState,
}

impl InMemoryTxn {
    fn staged(&mut self) -> Result<&mut ReadModelState> {
        if self.guard.is_none() {
            return Err(ProjectionError::TransactionClosed);
        }
        Ok(&mut self.staged)
    }
}

#[async_trait]
impl ReadModelTxn for InMemoryTxn {
    async fn subscription_for_update(
        &mut self,
        source: &SourceId,
        event_type: &EventType,
    ) -> Result<Option<Subscription>> {
        let state = self.staged()?;
        Ok(state
            .subscriptions
            .get(&(source.clone(), event_type.clone()))
            .cloned())
    }

    async fn record_outcome(&mut self, record: &OutcomeRecord) -> Result<Subscription> {
        Ok(self.staged()?.upsert_subscription(record))
    }

    async fn upsert_host(&mut self, host: &Host) -> Result<()> {
        let hosts = &mut self.staged()?.hosts;
        let last_heartbeat_at = hosts
            .get(&host.agent_id)
            .and_then(|stored| stored.last_heartbeat_at);
        hosts.insert(
            host.agent_id.clone(),
            Host {
                last_heartbeat_at,
                ..host.clone()
            },
        );
        Ok(())
    }

    async fn delete_host(&mut self, agent_id: &SourceId) -> Result<bool> {
        Ok(self.staged()?.hosts.remove(agent_id).is_some())
    }

    async fn record_heartbeat(&mut self, agent_id: &SourceId, at: DateTime<Utc>) -> Result<bool> {
        let Some(host) = self.staged()?.hosts.get_mut(agent_id) else {
            return Ok(false);
        };
        host.last_heartbeat_at = host.last_heartbeat_at.max(Some(at));
        Ok(true)
    }

    async fn upsert_cluster(&mut self, cluster: &Cluster) -> Result<()> {
        self.staged()?
            .clusters
            .insert(cluster.id.clone(), cluster.clone());
        Ok(())
    }

    async fn replace_sap_system_instances(
        &mut self,
        agent_id: &SourceId,
        instances: &[SapSystemInstance],
    ) -> Result<()> {
        let state = self.staged()?;
        if instances.is_empty() {
            state.sap_system_instances.remove(agent_id);
        } else {
            state
                .sap_system_instances
                .insert(agent_id.clone(), instances.to_vec());
        }
        Ok(())
    }

    async fn replace_sles_subscriptions(
        &mut self,
        agent_id: &SourceId,
        subscriptions: &[SlesSubscription],
    ) -> Result<()> {
        let state = self.staged()?;
        if subscriptions.is_empty() {
            state.sles_subscriptions.remove(agent_id);
        } else {
            state
                .sles_subscriptions
                .insert(agent_id.clone(), subscriptions.to_vec());
        }
        Ok(())
    }

    async fn upsert_checks_result(&mut self, result: &ChecksResult) -> Result<()> {
        self.staged()?
            .checks_results
            .insert(result.group_id.clone(), result.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut guard = self
            .guard
            .take()
            .ok_or(ProjectionError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        drop(
            self.guard
                .take()
                .ok_or(ProjectionError::TransactionClosed)?,
        );
        self.staged = ReadModelState::default();
        Ok(())
    }
}

#[async_trait]
impl SubscriptionLedger for InMemoryReadModelStore {
    async fn record_outcome(&self, record: OutcomeRecord) -> Result<Subscription> {
        let mut state = self.state.lock().await;
        Ok(state.upsert_subscription(&record))
    }

    async fn get_subscription(
        &self,
        source: &SourceId,
        event_type: &EventType,
    ) -> Result<Option<Subscription>> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .get(&(source.clone(), event_type.clone()))
            .cloned())
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let state = self.state.lock().await;
        Ok(state.subscriptions.values().cloned().collect())
    }
}

#[async_trait]
impl ReadModelStore for InMemoryReadModelStore {
    async fn begin(&self) -> Result<Box<dyn ReadModelTxn>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTxn {
            guard: Some(guard),
            staged,
        }))
    }

    async fn get_host(&self, agent_id: &SourceId) -> Result<Option<Host>> {
        Ok(self.state.lock().await.hosts.get(agent_id).cloned())
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        Ok(self.state.lock().await.hosts.values().cloned().collect())
    }

    async fn get_cluster(&self, id: &str) -> Result<Option<Cluster>> {
        Ok(self.state.lock().await.clusters.get(id).cloned())
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>> {
        Ok(self.state.lock().await.clusters.values().cloned().collect())
    }

    async fn sap_system_instances(&self, agent_id: &SourceId) -> Result<Vec<SapSystemInstance>> {
        let state = self.state.lock().await;
        Ok(state
            .sap_system_instances
            .get(agent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn sles_subscriptions(&self, agent_id: &SourceId) -> Result<Vec<SlesSubscription>> {
        let state = self.state.lock().await;
        Ok(state
            .sles_subscriptions
            .get(agent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_checks_result(&self, group_id: &str) -> Result<Option<ChecksResult>> {
        Ok(self.state.lock().await.checks_results.get(group_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use event_store::{EnvelopeId, NewEnvelope};

    fn host(agent: &str, hostname: &str) -> Host {
        Host {
            agent_id: SourceId::from(agent),
            hostname: hostname.to_string(),
            ip_addresses: vec!["10.0.0.1".to_string()],
            os_version: "15.3".to_string(),
            agent_version: "1.0.0".to_string(),
            cpu_count: 4,
            socket_count: 1,
            total_memory_mb: 8192,
            updated_at: Utc::now(),
            last_heartbeat_at: None,
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryReadModelStore::new();

        let mut txn = store.begin().await.unwrap();
        txn.upsert_host(&host("agent-1", "node01")).await.unwrap();
        txn.commit().await.unwrap();

        let stored = store.get_host(&SourceId::from("agent-1")).await.unwrap();
        assert_eq!(stored.unwrap().hostname, "node01");
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = InMemoryReadModelStore::new();

        let mut txn = store.begin().await.unwrap();
        txn.upsert_host(&host("agent-1", "node01")).await.unwrap();
        txn.rollback().await.unwrap();

        assert!(store.list_hosts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes_and_releases_lock() {
        let store = InMemoryReadModelStore::new();

        {
            let mut txn = store.begin().await.unwrap();
            txn.upsert_host(&host("agent-1", "node01")).await.unwrap();
        }

        assert!(store.list_hosts().await.unwrap().is_empty());
        // would deadlock if the guard leaked
        let mut txn = store.begin().await.unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn closed_transaction_rejects_writes() {
        let store = InMemoryReadModelStore::new();

        let mut txn = store.begin().await.unwrap();
        txn.commit().await.unwrap();

        assert!(matches!(
            txn.upsert_host(&host("agent-1", "node01")).await,
            Err(ProjectionError::TransactionClosed)
        ));
        assert!(matches!(
            txn.commit().await,
            Err(ProjectionError::TransactionClosed)
        ));
    }

    #[tokio::test]
    async fn ledger_outcome_inside_transaction() {
        let store = InMemoryReadModelStore::new();
        let envelope = NewEnvelope::new("agent-1", "host.discovered", serde_json::json!({}))
            .with_id(EnvelopeId::new(1));

        let mut txn = store.begin().await.unwrap();
        assert!(
            txn.subscription_for_update(&envelope.source, &envelope.event_type)
                .await
                .unwrap()
                .is_none()
        );
        txn.record_outcome(&OutcomeRecord::success(&envelope))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let sub = store
            .get_subscription(&envelope.source, &envelope.event_type)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.last_envelope_id, Some(EnvelopeId::new(1)));
        assert!(sub.outcome.is_success());
    }

    #[tokio::test]
    async fn standalone_failure_keeps_last_envelope() {
        let store = InMemoryReadModelStore::new();
        let first = NewEnvelope::new("agent-1", "host.discovered", serde_json::json!({}))
            .with_id(EnvelopeId::new(1));
        let second = NewEnvelope::new("agent-1", "host.discovered", serde_json::json!({}))
            .with_id(EnvelopeId::new(2));

        store
            .record_outcome(OutcomeRecord::success(&first))
            .await
            .unwrap();
        let sub = store
            .record_outcome(OutcomeRecord::failure(&second, "bad payload"))
            .await
            .unwrap();

        assert_eq!(sub.last_envelope_id, Some(EnvelopeId::new(1)));
        assert_eq!(sub.outcome.reason(), Some("bad payload"));
        assert_eq!(store.list_subscriptions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replacing_with_empty_set_clears_agent_rows() {
        let store = InMemoryReadModelStore::new();
        let agent = SourceId::from("agent-1");
        let sub = SlesSubscription {
            agent_id: agent.clone(),
            identifier: "SLES_SAP".to_string(),
            version: "15.3".to_string(),
            arch: "x86_64".to_string(),
            status: "Registered".to_string(),
            expires_at: None,
            updated_at: Utc::now(),
        };

        let mut txn = store.begin().await.unwrap();
        txn.replace_sles_subscriptions(&agent, &[sub]).await.unwrap();
        txn.commit().await.unwrap();
        assert_eq!(store.sles_subscriptions(&agent).await.unwrap().len(), 1);

        let mut txn = store.begin().await.unwrap();
        txn.replace_sles_subscriptions(&agent, &[]).await.unwrap();
        txn.commit().await.unwrap();
        assert!(store.sles_subscriptions(&agent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn heartbeat_survives_rediscovery_and_never_moves_back() {
        let store = InMemoryReadModelStore::new();
        let agent = SourceId::from("agent-1");
        let beat = Utc::now();

        let mut txn = store.begin().await.unwrap();
        assert!(!txn.record_heartbeat(&agent, beat).await.unwrap());
        txn.upsert_host(&host("agent-1", "node01")).await.unwrap();
        assert!(txn.record_heartbeat(&agent, beat).await.unwrap());
        assert!(
            txn.record_heartbeat(&agent, beat - Duration::seconds(30))
                .await
                .unwrap()
        );
        txn.upsert_host(&host("agent-1", "node01-renamed")).await.unwrap();
        txn.commit().await.unwrap();

        let stored = store.get_host(&agent).await.unwrap().unwrap();
        assert_eq!(stored.hostname, "node01-renamed");
        assert_eq!(stored.last_heartbeat_at, Some(beat));
    }
}
