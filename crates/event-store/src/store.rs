use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{Envelope, EnvelopeId, EnvelopeQuery, NewEnvelope, Result};

/// A stream of persisted envelopes in id order.
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = Result<Envelope>> + Send>>;

/// Number of rows fetched per page when streaming from a database.
pub(crate) const STREAM_PAGE_SIZE: i64 = 500;

/// Core trait for envelope store implementations.
///
/// The store is append-only: there is deliberately no update or delete
/// operation. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Durably persists a new envelope and returns its assigned id.
    ///
    /// When this returns `Ok` the envelope survives a process restart.
    async fn persist(&self, envelope: NewEnvelope) -> Result<EnvelopeId>;

    /// Retrieves a single envelope by id.
    async fn get_envelope(&self, id: EnvelopeId) -> Result<Option<Envelope>>;

    /// Retrieves envelopes matching a query, ordered by id.
    async fn query_envelopes(&self, query: EnvelopeQuery) -> Result<Vec<Envelope>>;

    /// Streams envelopes in id order, optionally starting after a given id.
    async fn stream_envelopes(&self, after: Option<EnvelopeId>) -> Result<EnvelopeStream>;

    /// Returns the number of stored envelopes.
    async fn envelope_count(&self) -> Result<u64>;
}

/// Extension trait providing convenience methods for envelope stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Persists a new envelope and returns it with its id attached.
    async fn persist_envelope(&self, envelope: NewEnvelope) -> Result<Envelope> {
        let id = self.persist(envelope.clone()).await?;
        Ok(envelope.with_id(id))
    }

    /// Retrieves every envelope reported by one source.
    async fn envelopes_for_source(&self, source: &str) -> Result<Vec<Envelope>> {
        self.query_envelopes(EnvelopeQuery::for_source(source)).await
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}
