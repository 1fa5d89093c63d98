use chrono::{DateTime, Utc};

use crate::{EnvelopeId, EventType, SourceId};

/// Builder for constructing envelope queries.
///
/// Results are always ordered by envelope id (persistence order).
#[derive(Debug, Clone, Default)]
pub struct EnvelopeQuery {
    /// Filter by reporting source.
    pub source: Option<SourceId>,

    /// Filter by event types (any of these types).
    pub event_types: Option<Vec<EventType>>,

    /// Only envelopes with an id strictly greater than this one.
    pub after: Option<EnvelopeId>,

    /// Filter by envelopes received at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Filter by envelopes received at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Maximum number of envelopes to return.
    pub limit: Option<usize>,

    /// Number of envelopes to skip.
    pub offset: Option<usize>,
}

impl EnvelopeQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific source.
    pub fn for_source(source: impl Into<SourceId>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    /// Creates a query for envelopes of a specific type.
    pub fn for_event_type(event_type: impl Into<EventType>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    /// Filters by source.
    pub fn source(mut self, source: impl Into<SourceId>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Filters by event type.
    pub fn event_type(mut self, event_type: impl Into<EventType>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    /// Filters by multiple event types (any of these).
    pub fn event_types(mut self, event_types: Vec<EventType>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Returns only envelopes persisted after the given id.
    pub fn after(mut self, id: EnvelopeId) -> Self {
        self.after = Some(id);
        self
    }

    /// Filters to envelopes received at or after this timestamp.
    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    /// Filters to envelopes received at or before this timestamp.
    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Limits the number of envelopes returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many envelopes before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}
