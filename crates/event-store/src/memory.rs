use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    Envelope, EnvelopeId, EnvelopeQuery, NewEnvelope, Result,
    store::{EnvelopeStream, EventStore},
};

/// In-memory envelope store for tests and database-less runs.
///
/// Provides the same interface as the PostgreSQL implementation; ids are
/// assigned from 1 upwards in persistence order.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    envelopes: Arc<RwLock<Vec<Envelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every stored envelope.
    pub async fn all(&self) -> Vec<Envelope> {
        self.envelopes.read().await.clone()
    }
}

fn matches(query: &EnvelopeQuery, envelope: &Envelope) -> bool {
    if let Some(ref source) = query.source
        && &envelope.source != source
    {
        return false;
    }
    if let Some(ref types) = query.event_types
        && !types.contains(&envelope.event_type)
    {
        return false;
    }
    if let Some(after) = query.after
        && envelope.id <= after
    {
        return false;
    }
    if let Some(from) = query.from_timestamp
        && envelope.received_at < from
    {
        return false;
    }
    if let Some(to) = query.to_timestamp
        && envelope.received_at > to
    {
        return false;
    }
    true
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn persist(&self, envelope: NewEnvelope) -> Result<EnvelopeId> {
        envelope.validate()?;

        let mut store = self.envelopes.write().await;
        let id = EnvelopeId::new(store.len() as i64 + 1);
        store.push(envelope.with_id(id));

        metrics::counter!("event_store_envelopes_persisted_total").increment(1);
        Ok(id)
    }

    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<Envelope>> {
        let store = self.envelopes.read().await;
        Ok(store.iter().find(|e| e.id == id).cloned())
    }

    async fn query_envelopes(&self, query: EnvelopeQuery) -> Result<Vec<Envelope>> {
        let store = self.envelopes.read().await;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        // The vector is already in id order.
        Ok(store
            .iter()
            .filter(|e| matches(&query, e))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn stream_envelopes(&self, after: Option<EnvelopeId>) -> Result<EnvelopeStream> {
        use futures_util::stream;

        let store = self.envelopes.read().await;
        let envelopes: Vec<_> = store
            .iter()
            .filter(|e| after.is_none_or(|after| e.id > after))
            .cloned()
            .collect();

        Ok(Box::pin(stream::iter(envelopes.into_iter().map(Ok))))
    }

    async fn envelope_count(&self) -> Result<u64> {
        Ok(self.envelopes.read().await.len() as u64)
    }
}
