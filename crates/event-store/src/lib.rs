//! Append-only store for collected envelopes.
//!
//! Every fact reported by an agent is wrapped in an [`Envelope`] and persisted
//! here before it is handed to the projection pipeline. Envelopes are never
//! updated or deleted; the store is the audit log and the replay source.

pub mod envelope;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{EventType, SourceId};
pub use envelope::{Envelope, EnvelopeId, NewEnvelope};
pub use error::{EventStoreError, Result};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EnvelopeQuery;
pub use store::{EnvelopeStream, EventStore, EventStoreExt};
