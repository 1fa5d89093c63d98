//! Event type to projector registry.

use std::collections::HashMap;
use std::sync::Arc;

use common::EventType;

use crate::projectors::{
    ChecksResultProjector, ClusterProjector, HostProjector, SapSystemProjector,
    SlesSubscriptionProjector,
};
use crate::{ProjectionError, Projector, Result};

/// Collects projector registrations before the pipeline starts.
#[derive(Default)]
pub struct ProjectorRegistryBuilder {
    projectors: HashMap<EventType, Arc<dyn Projector>>,
}

impl ProjectorRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `projector` for a single event type.
    ///
    /// Fails if another projector already owns the event type.
    pub fn register(
        mut self,
        event_type: impl Into<EventType>,
        projector: Arc<dyn Projector>,
    ) -> Result<Self> {
        let event_type = event_type.into();
        if let Some(existing) = self.projectors.get(&event_type) {
            return Err(ProjectionError::DuplicateProjector {
                event_type,
                existing: existing.name(),
            });
        }
        self.projectors.insert(event_type, projector);
        Ok(self)
    }

    /// Registers `projector` for every event type it declares.
    pub fn register_projector(self, projector: Arc<dyn Projector>) -> Result<Self> {
        projector
            .event_types()
            .iter()
            .try_fold(self, |builder, event_type| {
                builder.register(*event_type, Arc::clone(&projector))
            })
    }

    pub fn build(self) -> ProjectorRegistry {
        ProjectorRegistry {
            projectors: self.projectors,
        }
    }
}

/// Immutable mapping from event type to the projector that handles it.
///
/// Shared between workers behind an `Arc`; nothing can be registered once
/// built.
pub struct ProjectorRegistry {
    projectors: HashMap<EventType, Arc<dyn Projector>>,
}

impl ProjectorRegistry {
    pub fn builder() -> ProjectorRegistryBuilder {
        ProjectorRegistryBuilder::new()
    }

    /// Registry with every production projector.
    pub fn default_registry() -> Result<Self> {
        Ok(Self::builder()
            .register_projector(Arc::new(HostProjector))?
            .register_projector(Arc::new(ClusterProjector))?
            .register_projector(Arc::new(SapSystemProjector))?
            .register_projector(Arc::new(SlesSubscriptionProjector))?
            .register_projector(Arc::new(ChecksResultProjector))?
            .build())
    }

    /// Looks up the projector for `event_type`.
    pub fn resolve(&self, event_type: &str) -> Result<Arc<dyn Projector>> {
        self.projectors
            .get(event_type)
            .cloned()
            .ok_or_else(|| ProjectionError::UnknownEventType(EventType::from(event_type)))
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.projectors.contains_key(event_type)
    }

    /// Registered event types in sorted order.
    pub fn event_types(&self) -> Vec<&EventType> {
        let mut types: Vec<_> = self.projectors.keys().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.projectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectors.is_empty()
    }
}

impl std::fmt::Debug for ProjectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectorRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}
