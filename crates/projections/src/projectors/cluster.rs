use async_trait::async_trait;
use domain::event_types::CLUSTER_DISCOVERED;
use domain::{Cluster, ClusterDiscovered};
use event_store::Envelope;

use crate::store::ReadModelTxn;
use crate::{Projector, Result};

/// Maintains `clusters`, keyed by cluster id.
pub struct ClusterProjector;

#[async_trait]
impl Projector for ClusterProjector {
    fn name(&self) -> &'static str {
        "clusters"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[CLUSTER_DISCOVERED]
    }

    async fn project(&self, envelope: &Envelope, txn: &mut dyn ReadModelTxn) -> Result<()> {
        let payload: ClusterDiscovered = envelope.decode()?;
        let cluster = Cluster::from_payload(envelope.source.clone(), payload, envelope.received_at)?;
        txn.upsert_cluster(&cluster).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projectors::test_support::{apply, envelope};
    use crate::store::{InMemoryReadModelStore, ReadModelStore};
    use domain::ClusterType;
    use serde_json::json;

    #[tokio::test]
    async fn every_node_reports_the_same_cluster() {
        let store = InMemoryReadModelStore::new();
        let payload = json!({
            "id": "cluster-1",
            "name": "hana_cluster",
            "cluster_type": "hana_scale_up",
            "sid": "PRD",
            "nodes": ["node01", "node02"]
        });

        apply(&store, &ClusterProjector, &envelope(1, "agent-1", CLUSTER_DISCOVERED, payload.clone()))
            .await
            .unwrap();
        apply(&store, &ClusterProjector, &envelope(2, "agent-2", CLUSTER_DISCOVERED, payload))
            .await
            .unwrap();

        let clusters = store.list_clusters().await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].cluster_type, ClusterType::HanaScaleUp);
        assert_eq!(clusters[0].reported_by.as_str(), "agent-2");
    }

    #[tokio::test]
    async fn invalid_sid_is_rejected() {
        let store = InMemoryReadModelStore::new();
        let env = envelope(1, "agent-1", CLUSTER_DISCOVERED, json!({"id": "c1", "sid": "prd"}));

        assert!(apply(&store, &ClusterProjector, &env).await.is_err());
        assert!(store.get_cluster("c1").await.unwrap().is_none());
    }
}
