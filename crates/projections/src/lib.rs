//! Projection side of the agent fact pipeline.
//!
//! This crate turns persisted envelopes into read-model state:
//! - [`Projector`] capability and the concrete projectors in [`projectors`]
//! - [`ProjectorRegistry`] mapping event types to projectors, frozen at startup
//! - [`SubscriptionLedger`] tracking the last outcome per (source, event type)
//! - [`ReadModelStore`] with in-memory and PostgreSQL implementations, whose
//!   transactions span entity writes and the ledger update

pub mod error;
pub mod ledger;
pub mod projector;
pub mod projectors;
pub mod registry;
pub mod store;

pub use error::{ProjectionError, Result};
pub use ledger::{Outcome, OutcomeRecord, Subscription, SubscriptionLedger};
pub use projector::Projector;
pub use projectors::{
    ChecksResultProjector, ClusterProjector, HostProjector, SapSystemProjector,
    SlesSubscriptionProjector,
};
pub use registry::{ProjectorRegistry, ProjectorRegistryBuilder};
pub use store::{InMemoryReadModelStore, PostgresReadModelStore, ReadModelStore, ReadModelTxn};
