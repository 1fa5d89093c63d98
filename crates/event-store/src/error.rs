use thiserror::Error;

/// Errors that can occur when interacting with the envelope store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The envelope was rejected before reaching storage.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for envelope store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
