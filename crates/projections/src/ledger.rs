//! Subscription ledger: the last known outcome per (source, event type).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventType, SourceId};
use event_store::{Envelope, EnvelopeId};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Result of handling one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    /// The failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(reason) => Some(reason),
        }
    }

    /// Storage representation of the outcome kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure(_) => "failure",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// One outcome to be written to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub source: SourceId,
    pub event_type: EventType,
    pub envelope_id: EnvelopeId,
    pub outcome: Outcome,
    pub processed_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(envelope: &Envelope, outcome: Outcome) -> Self {
        Self {
            source: envelope.source.clone(),
            event_type: envelope.event_type.clone(),
            envelope_id: envelope.id,
            outcome,
            processed_at: Utc::now(),
        }
    }

    pub fn success(envelope: &Envelope) -> Self {
        Self::new(envelope, Outcome::Success)
    }

    pub fn failure(envelope: &Envelope, reason: impl Into<String>) -> Self {
        Self::new(envelope, Outcome::failure(reason))
    }
}

/// Ledger row for a (source, event type) pair.
///
/// `last_envelope_id` only moves on success, so it marks the newest envelope
/// whose effects are visible in the read models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub source: SourceId,
    pub event_type: EventType,
    pub last_envelope_id: Option<EnvelopeId>,
    pub last_processed_at: DateTime<Utc>,
    pub outcome: Outcome,
}

impl Subscription {
    /// Creates the ledger row for the first outcome of a pair.
    pub fn from_record(record: &OutcomeRecord) -> Self {
        Self {
            source: record.source.clone(),
            event_type: record.event_type.clone(),
            last_envelope_id: record.outcome.is_success().then_some(record.envelope_id),
            last_processed_at: record.processed_at,
            outcome: record.outcome.clone(),
        }
    }

    /// Folds a newer outcome into the row.
    pub fn apply(&mut self, record: &OutcomeRecord) {
        if record.outcome.is_success() {
            self.last_envelope_id = Some(
                self.last_envelope_id
                    .map_or(record.envelope_id, |last| last.max(record.envelope_id)),
            );
        }
        self.last_processed_at = self.last_processed_at.max(record.processed_at);
        self.outcome = record.outcome.clone();
    }

    /// True when `id` is not newer than the last applied envelope.
    pub fn is_stale(&self, id: EnvelopeId) -> bool {
        self.last_envelope_id.is_some_and(|last| id <= last)
    }
}

/// Read/write access to the subscription ledger.
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    /// Upserts the outcome for the record's pair outside any projection
    /// transaction. Used for failures after the transaction rolled back.
    async fn record_outcome(&self, record: OutcomeRecord) -> Result<Subscription>;

    async fn get_subscription(
        &self,
        source: &SourceId,
        event_type: &EventType,
    ) -> Result<Option<Subscription>>;

    /// All ledger rows ordered by (source, event type).
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    async fn subscriptions_for_source(&self, source: &SourceId) -> Result<Vec<Subscription>> {
        let all = self.list_subscriptions().await?;
        Ok(all.into_iter().filter(|s| &s.source == source).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::NewEnvelope;

    fn envelope(id: i64) -> Envelope {
        NewEnvelope::new("agent-1", "host.discovered", serde_json::json!({}))
            .with_id(EnvelopeId::new(id))
    }

    #[test]
    fn failure_does_not_advance_last_envelope() {
        let mut sub = Subscription::from_record(&OutcomeRecord::success(&envelope(3)));
        assert_eq!(sub.last_envelope_id, Some(EnvelopeId::new(3)));

        sub.apply(&OutcomeRecord::failure(&envelope(4), "boom"));

        assert_eq!(sub.last_envelope_id, Some(EnvelopeId::new(3)));
        assert_eq!(sub.outcome, Outcome::failure("boom"));
    }

    #[test]
    fn first_failure_has_no_last_envelope() {
        let sub = Subscription::from_record(&OutcomeRecord::failure(&envelope(1), "bad"));
        assert_eq!(sub.last_envelope_id, None);
        assert!(!sub.is_stale(EnvelopeId::new(1)));
    }

    #[test]
    fn staleness() {
        let sub = Subscription::from_record(&OutcomeRecord::success(&envelope(5)));
        assert!(sub.is_stale(EnvelopeId::new(4)));
        assert!(sub.is_stale(EnvelopeId::new(5)));
        assert!(!sub.is_stale(EnvelopeId::new(6)));
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let json = serde_json::to_value(Outcome::failure("unknown event type")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "failure", "reason": "unknown event type"})
        );
        let json = serde_json::to_value(Outcome::Success).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success"}));
    }
}
