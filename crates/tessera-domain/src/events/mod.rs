//! Domain events
//!
//! Aggregates record events while they change; callers take the buffered
//! events after persisting the aggregate and dispatch them however the
//! application sees fit.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something that happened to an aggregate
pub trait DomainEvent: Debug + Send + Sync {
    /// Unique id of this event occurrence
    fn event_id(&self) -> Uuid;

    /// Id of the aggregate that emitted the event
    fn aggregate_id(&self) -> Uuid;

    /// When the event happened
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Stable event name, used for routing and serialization
    fn event_type(&self) -> &str;
}

/// Metadata shared by every event struct
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventMetadata {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl EventMetadata {
    pub fn new() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Events recorded by an aggregate and not yet taken
#[derive(Debug, Default)]
pub struct EventBuffer {
    pending: Vec<Box<dyn DomainEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Box<dyn DomainEvent>) {
        self.pending.push(event);
    }

    /// Remove and return every pending event in recording order
    pub fn take(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn event_types(&self) -> Vec<&str> {
        self.pending.iter().map(|e| e.event_type()).collect()
    }
}
