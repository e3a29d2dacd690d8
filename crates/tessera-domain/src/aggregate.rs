//! Aggregate roots
//!
//! An aggregate root is the only entity of its cluster that repositories
//! load and save. It records a domain event for every state change.

use crate::entities::Entity;
use crate::events::{DomainEvent, EventBuffer};

/// Entity that owns a consistency boundary and records domain events
pub trait AggregateRoot: Entity {
    /// Buffer holding events not yet taken
    fn event_buffer(&mut self) -> &mut EventBuffer;

    /// Record an event
    fn record<E>(&mut self, event: E)
    where
        E: DomainEvent + 'static,
        Self: Sized,
    {
        self.event_buffer().push(Box::new(event));
    }

    /// Take every recorded event, leaving the buffer empty
    fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        self.event_buffer().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DomainError, DomainResult};
    use crate::events::EventMetadata;
    use crate::value_objects::EntityId;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    #[derive(Debug)]
    struct Renamed {
        metadata: EventMetadata,
        aggregate: Uuid,
    }

    impl DomainEvent for Renamed {
        fn event_id(&self) -> Uuid {
            self.metadata.event_id
        }

        fn aggregate_id(&self) -> Uuid {
            self.aggregate
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.metadata.occurred_at
        }

        fn event_type(&self) -> &str {
            "Renamed"
        }
    }

    #[derive(Debug)]
    struct Catalog {
        id: EntityId<Catalog>,
        name: String,
        events: EventBuffer,
    }

    impl Catalog {
        fn rename(&mut self, name: &str) -> DomainResult<()> {
            if name.trim().is_empty() {
                return Err(DomainError::ValidationError {
                    field: "name".into(),
                    reason: "Name cannot be empty".into(),
                });
            }
            self.name = name.to_string();
            let aggregate = self.id.as_uuid();
            self.record(Renamed {
                metadata: EventMetadata::new(),
                aggregate,
            });
            Ok(())
        }
    }

    impl Entity for Catalog {
        type Id = EntityId<Catalog>;

        fn id(&self) -> &Self::Id {
            &self.id
        }
    }

    impl AggregateRoot for Catalog {
        fn event_buffer(&mut self) -> &mut EventBuffer {
            &mut self.events
        }
    }

    #[test]
    fn test_changes_record_events() {
        let mut catalog = Catalog {
            id: EntityId::new(),
            name: "spring".into(),
            events: EventBuffer::new(),
        };

        catalog.rename("summer").unwrap();
        assert!(catalog.rename("").is_err());

        let events = catalog.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate_id(), catalog.id().as_uuid());
        assert!(catalog.take_events().is_empty());
        assert_eq!(catalog.name, "summer");
    }
}
