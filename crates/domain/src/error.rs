//! Domain error types.

use thiserror::Error;

/// Validation errors raised while turning a payload into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A required field is empty.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    /// SAP system ids are three upper-case alphanumerics starting with a letter.
    #[error("Invalid SAP system id {sid:?}")]
    InvalidSid { sid: String },

    /// SAP instance numbers are exactly two digits.
    #[error("Invalid instance number {instance_number:?} (must be two digits)")]
    InvalidInstanceNumber { instance_number: String },

    /// A checks result must carry at least one result.
    #[error("Checks result for group {group_id} contains no results")]
    EmptyChecksResult { group_id: String },

    /// The same key appears twice in one reported set.
    #[error("Duplicate {kind} {key} in one report")]
    DuplicateEntry { kind: &'static str, key: String },

    /// A numeric value does not fit the storage column.
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: String },

    /// A stored enum value could not be recognised.
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Result type for domain validation.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Fails with `MissingField` when `value` is empty or whitespace.
pub(crate) fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::MissingField { field });
    }
    Ok(())
}
