use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Identifier of the agent (or other source) that reported a fact.
///
/// Agents identify themselves with an opaque string, usually a machine id.
/// The pipeline never interprets it beyond equality and ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a source identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identifier is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Discriminator naming the kind of fact carried by an envelope,
/// e.g. `"host.discovered"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    /// Creates an event type from any string-like value.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    /// Returns the discriminator as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the discriminator is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(event_type: &str) -> Self {
        Self(event_type.to_string())
    }
}

impl From<String> for EventType {
    fn from(event_type: String) -> Self {
        Self(event_type)
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets registries keyed by `EventType` be queried with a plain `&str`.
impl Borrow<str> for EventType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn source_id_display_matches_input() {
        let id = SourceId::new("host-1");
        assert_eq!(id.to_string(), "host-1");
        assert_eq!(id.as_str(), "host-1");
    }

    #[test]
    fn blank_identifiers_are_detected() {
        assert!(SourceId::new("   ").is_blank());
        assert!(EventType::new("").is_blank());
        assert!(!EventType::new("host.discovered").is_blank());
    }

    #[test]
    fn event_type_serializes_as_plain_string() {
        let event_type = EventType::from("cluster.discovered");
        let json = serde_json::to_string(&event_type).unwrap();
        assert_eq!(json, "\"cluster.discovered\"");
    }

    #[test]
    fn event_type_map_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(EventType::from("host.discovered"), 1);
        assert_eq!(map.get("host.discovered"), Some(&1));
        assert_eq!(map.get("unknown.type"), None);
    }
}
