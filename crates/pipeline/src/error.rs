//! Pipeline error types.

use std::time::Duration;

use event_store::{EnvelopeId, EventStoreError};
use projections::ProjectionError;
use thiserror::Error;

/// Failure to hand an envelope to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The ingress queue stayed full for the whole enqueue timeout.
    #[error("Ingress queue full after waiting {timeout:?}")]
    Backpressure { timeout: Duration },

    /// The dispatcher has stopped and no longer accepts work.
    #[error("Dispatcher is not running")]
    Closed,
}

/// Errors returned to whoever submits a fact to the collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Rejected before anything was persisted.
    #[error("Invalid submission: {0}")]
    Invalid(String),

    /// Persisting failed; nothing was acknowledged.
    #[error("Failed to persist envelope: {0}")]
    Store(#[source] EventStoreError),

    /// Persisted, but the dispatcher did not take it in time. Replay will
    /// pick it up.
    #[error("Envelope {envelope_id} persisted but ingress queue stayed full for {timeout:?}")]
    Backpressure {
        envelope_id: EnvelopeId,
        timeout: Duration,
    },

    /// Persisted, but the dispatcher is gone.
    #[error("Envelope {envelope_id} persisted but dispatcher is not running")]
    Closed { envelope_id: EnvelopeId },
}

impl CollectorError {
    /// Id of the envelope when it was persisted before the failure.
    pub fn envelope_id(&self) -> Option<EnvelopeId> {
        match self {
            CollectorError::Backpressure { envelope_id, .. }
            | CollectorError::Closed { envelope_id } => Some(*envelope_id),
            _ => None,
        }
    }
}

/// Errors from pipeline-level operations such as replay.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Enqueue error: {0}")]
    Enqueue(#[from] EnqueueError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
