//! Projection error types.

use common::EventType;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while resolving or running a projector.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// No projector is registered for the event type.
    #[error("Unknown event type: {0}")]
    UnknownEventType(EventType),

    /// A second projector was registered for an event type.
    #[error("Event type {event_type} is already handled by projector {existing}")]
    DuplicateProjector {
        event_type: EventType,
        existing: &'static str,
    },

    /// Failed to deserialize an envelope payload.
    #[error("Payload deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The payload decoded but failed domain validation.
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The storage backend is temporarily unavailable.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The transaction was already committed or rolled back.
    #[error("Transaction already closed")]
    TransactionClosed,

    /// The projector panicked while handling the envelope.
    #[error("projector panicked")]
    Panicked,

    /// A projector-specific error.
    #[error("Projection error: {0}")]
    Projection(String),
}

impl ProjectionError {
    /// Returns true for failures that may succeed when retried unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            ProjectionError::Unavailable(_) => true,
            ProjectionError::Database(err) => match err {
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => {
                    true
                }
                // serialization_failure, deadlock_detected
                sqlx::Error::Database(db_err) => {
                    matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
                }
                _ => false,
            },
            _ => false,
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProjectionError::Unavailable("down".into()).is_transient());
        assert!(ProjectionError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!ProjectionError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(
            !ProjectionError::Validation(DomainError::MissingField { field: "hostname" })
                .is_transient()
        );
        assert!(!ProjectionError::UnknownEventType(EventType::from("x")).is_transient());
    }
}
