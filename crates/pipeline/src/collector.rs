//! Entry point for facts reported by agents.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{EventType, SourceId};
use event_store::{EnvelopeId, EventStore, EventStoreError, EventStoreExt, NewEnvelope};
use serde::Serialize;

use crate::dispatcher::IngressSender;
use crate::error::{CollectorError, EnqueueError};

/// Acknowledgement returned once an envelope is durably persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub envelope_id: EnvelopeId,
    pub received_at: DateTime<Utc>,
}

/// Validates, persists and enqueues submitted facts.
///
/// Persistence happens before enqueueing, so a fact that was acknowledged,
/// or that failed with `Backpressure` or `Closed`, is never lost: replay
/// picks up anything the dispatcher did not see.
#[derive(Clone)]
pub struct Collector {
    store: Arc<dyn EventStore>,
    ingress: IngressSender,
}

impl Collector {
    pub fn new(store: Arc<dyn EventStore>, ingress: IngressSender) -> Self {
        Self { store, ingress }
    }

    #[tracing::instrument(skip_all, fields(source = %source, event_type = %event_type))]
    pub async fn submit(
        &self,
        payload: serde_json::Value,
        source: SourceId,
        event_type: EventType,
    ) -> Result<Ack, CollectorError> {
        if payload.is_null() {
            return Err(CollectorError::Invalid("payload must not be null".to_string()));
        }

        let new_envelope = NewEnvelope::new(source, event_type, payload);
        new_envelope.validate().map_err(invalid_or_store)?;

        let envelope = self
            .store
            .persist_envelope(new_envelope)
            .await
            .map_err(invalid_or_store)?;
        let ack = Ack {
            envelope_id: envelope.id,
            received_at: envelope.received_at,
        };
        metrics::counter!("collector_envelopes_received_total").increment(1);

        match self.ingress.enqueue(envelope).await {
            Ok(()) => {
                tracing::debug!(envelope_id = %ack.envelope_id, "envelope accepted");
                Ok(ack)
            }
            Err(EnqueueError::Backpressure { timeout }) => {
                tracing::warn!(envelope_id = %ack.envelope_id, ?timeout, "ingress queue full");
                Err(CollectorError::Backpressure {
                    envelope_id: ack.envelope_id,
                    timeout,
                })
            }
            Err(EnqueueError::Closed) => {
                tracing::warn!(envelope_id = %ack.envelope_id, "dispatcher not running");
                Err(CollectorError::Closed {
                    envelope_id: ack.envelope_id,
                })
            }
        }
    }
}

fn invalid_or_store(err: EventStoreError) -> CollectorError {
    match err {
        EventStoreError::InvalidEnvelope(reason) => CollectorError::Invalid(reason),
        other => CollectorError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dispatcher, PipelineConfig};
    use event_store::InMemoryEventStore;
    use projections::{InMemoryReadModelStore, ProjectorRegistry};

    fn collector() -> (Collector, Dispatcher, InMemoryEventStore) {
        let events = InMemoryEventStore::new();
        let registry = Arc::new(ProjectorRegistry::default_registry().unwrap());
        let (dispatcher, sender) = Dispatcher::new(
            registry,
            Arc::new(InMemoryReadModelStore::new()),
            PipelineConfig::default(),
        );
        (
            Collector::new(Arc::new(events.clone()), sender),
            dispatcher,
            events,
        )
    }

    #[tokio::test]
    async fn ack_after_persist() {
        let (collector, _dispatcher, events) = collector();

        let ack = collector
            .submit(
                serde_json::json!({"hostname": "node01"}),
                "agent-1".into(),
                "host.discovered".into(),
            )
            .await
            .unwrap();

        let stored = events.get_envelope(ack.envelope_id).await.unwrap().unwrap();
        assert_eq!(stored.source.as_str(), "agent-1");
        assert_eq!(stored.received_at, ack.received_at);
    }

    #[tokio::test]
    async fn blank_identifiers_are_rejected_before_persisting() {
        let (collector, _dispatcher, events) = collector();

        let result = collector
            .submit(serde_json::json!({}), "".into(), "host.discovered".into())
            .await;
        assert!(matches!(result, Err(CollectorError::Invalid(_))));

        let result = collector
            .submit(serde_json::json!({}), "agent-1".into(), " ".into())
            .await;
        assert!(matches!(result, Err(CollectorError::Invalid(_))));

        let result = collector
            .submit(serde_json::Value::Null, "agent-1".into(), "host.discovered".into())
            .await;
        assert!(matches!(result, Err(CollectorError::Invalid(_))));

        assert_eq!(events.envelope_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn closed_dispatcher_still_persists() {
        let (collector, dispatcher, events) = collector();
        drop(dispatcher);

        let err = collector
            .submit(serde_json::json!({}), "agent-1".into(), "host.discovered".into())
            .await
            .unwrap_err();

        let envelope_id = err.envelope_id().unwrap();
        assert!(matches!(err, CollectorError::Closed { .. }));
        assert!(events.get_envelope(envelope_id).await.unwrap().is_some());
    }
}
