use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{EventStoreError, EventType, SourceId};

/// Store-assigned identifier of a persisted envelope.
///
/// Identifiers are allocated from a single increasing sequence, so a larger
/// id always means the envelope was persisted later.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EnvelopeId(i64);

impl EnvelopeId {
    /// Creates an id from its raw sequence value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EnvelopeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<EnvelopeId> for i64 {
    fn from(id: EnvelopeId) -> Self {
        id.0
    }
}

/// An envelope that has not been persisted yet and therefore has no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnvelope {
    /// The agent that reported the fact.
    pub source: SourceId,

    /// Discriminator used to resolve the projector.
    pub event_type: EventType,

    /// The raw reported payload.
    pub payload: serde_json::Value,

    /// When the collector received the payload.
    pub received_at: DateTime<Utc>,
}

impl NewEnvelope {
    /// Creates an envelope received now.
    pub fn new(
        source: impl Into<SourceId>,
        event_type: impl Into<EventType>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            source: source.into(),
            event_type: event_type.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    /// Overrides the received timestamp.
    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }

    /// Checks the fields every store requires before persisting.
    pub fn validate(&self) -> Result<(), EventStoreError> {
        if self.source.is_blank() {
            return Err(EventStoreError::InvalidEnvelope(
                "source identifier must not be empty".to_string(),
            ));
        }
        if self.event_type.is_blank() {
            return Err(EventStoreError::InvalidEnvelope(
                "event type must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Attaches the id assigned by the store.
    pub fn with_id(self, id: EnvelopeId) -> Envelope {
        Envelope {
            id,
            source: self.source,
            event_type: self.event_type,
            payload: self.payload,
            received_at: self.received_at,
        }
    }
}

/// A persisted, immutable record of one collected fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: EnvelopeId,
    pub source: SourceId,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl Envelope {
    /// Deserializes the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Heartbeat {
        hostname: String,
    }

    #[test]
    fn envelope_ids_order_by_sequence() {
        assert!(EnvelopeId::new(1) < EnvelopeId::new(2));
        assert_eq!(EnvelopeId::from(7).as_i64(), 7);
    }

    #[test]
    fn with_id_keeps_fields() {
        let received_at = Utc::now();
        let envelope = NewEnvelope::new("host-1", "host.discovered", serde_json::json!({"a": 1}))
            .received_at(received_at)
            .with_id(EnvelopeId::new(42));

        assert_eq!(envelope.id, EnvelopeId::new(42));
        assert_eq!(envelope.source.as_str(), "host-1");
        assert_eq!(envelope.event_type.as_str(), "host.discovered");
        assert_eq!(envelope.received_at, received_at);
    }

    #[test]
    fn validate_rejects_blank_identifiers() {
        let blank_source = NewEnvelope::new("", "host.discovered", serde_json::json!({}));
        assert!(matches!(
            blank_source.validate(),
            Err(EventStoreError::InvalidEnvelope(_))
        ));

        let blank_type = NewEnvelope::new("host-1", " ", serde_json::json!({}));
        assert!(blank_type.validate().is_err());

        let ok = NewEnvelope::new("host-1", "unknown.type", serde_json::json!({}));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn decode_payload() {
        let envelope = NewEnvelope::new(
            "host-1",
            "host.discovered",
            serde_json::json!({"hostname": "node01"}),
        )
        .with_id(EnvelopeId::new(1));

        let decoded: Heartbeat = envelope.decode().unwrap();
        assert_eq!(
            decoded,
            Heartbeat {
                hostname: "node01".to_string()
            }
        );
        assert!(envelope.decode::<Vec<u8>>().is_err());
    }
}
