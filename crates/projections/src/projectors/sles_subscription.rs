use async_trait::async_trait;
use domain::event_types::SUBSCRIPTION_DISCOVERED;
use domain::{SlesSubscription, SubscriptionDiscovered};
use event_store::Envelope;

use crate::store::ReadModelTxn;
use crate::{Projector, Result};

/// Maintains `sles_subscriptions`, replacing the reporting host's full set.
pub struct SlesSubscriptionProjector;

#[async_trait]
impl Projector for SlesSubscriptionProjector {
    fn name(&self) -> &'static str {
        "sles_subscriptions"
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[SUBSCRIPTION_DISCOVERED]
    }

    async fn project(&self, envelope: &Envelope, txn: &mut dyn ReadModelTxn) -> Result<()> {
        let payload: SubscriptionDiscovered = envelope.decode()?;
        let subscriptions =
            SlesSubscription::from_payload(&envelope.source, payload, envelope.received_at)?;
        txn.replace_sles_subscriptions(&envelope.source, &subscriptions)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projectors::test_support::{apply, envelope};
    use crate::store::{InMemoryReadModelStore, ReadModelStore};
    use common::SourceId;
    use serde_json::json;

    #[tokio::test]
    async fn subscription_set_is_replaced() {
        let store = InMemoryReadModelStore::new();
        let agent = SourceId::from("agent-1");

        let first = envelope(
            1,
            "agent-1",
            SUBSCRIPTION_DISCOVERED,
            json!({"subscriptions": [
                {"identifier": "SLES_SAP", "status": "Registered"},
                {"identifier": "sle-module-basesystem", "status": "Registered"}
            ]}),
        );
        apply(&store, &SlesSubscriptionProjector, &first).await.unwrap();

        let second = envelope(2, "agent-1", SUBSCRIPTION_DISCOVERED, json!({"subscriptions": []}));
        apply(&store, &SlesSubscriptionProjector, &second).await.unwrap();

        assert!(store.sles_subscriptions(&agent).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_identifier_keeps_previous_set() {
        let store = InMemoryReadModelStore::new();
        let agent = SourceId::from("agent-1");

        let good = envelope(
            1,
            "agent-1",
            SUBSCRIPTION_DISCOVERED,
            json!({"subscriptions": [{"identifier": "SLES_SAP", "status": "Registered"}]}),
        );
        apply(&store, &SlesSubscriptionProjector, &good).await.unwrap();

        let repeated = envelope(
            2,
            "agent-1",
            SUBSCRIPTION_DISCOVERED,
            json!({"subscriptions": [
                {"identifier": "sle-module-basesystem", "status": "Registered"},
                {"identifier": "sle-module-basesystem", "status": "Expired"}
            ]}),
        );
        let err = apply(&store, &SlesSubscriptionProjector, &repeated)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ProjectionError::Validation(domain::DomainError::DuplicateEntry { .. })
        ));

        let subs = store.sles_subscriptions(&agent).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].identifier, "SLES_SAP");
    }
}
