//! Domain modeling building blocks
//!
//! The domain layer defines contracts only; storage engines live in
//! infrastructure crates such as `tessera-persistence`.
//!
//! - [`entities`]: identity-bearing entities and value objects
//! - [`value_objects`]: typed identifiers and the storage [`Engine`] name
//! - [`events`]: domain events and the aggregate event buffer
//! - [`aggregate`]: aggregate roots that record events
//! - [`repositories`]: storage drivers and repositories
//! - [`unit_of_work`]: transactional scope state machine

pub mod aggregate;
pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;
pub mod unit_of_work;
pub mod value_objects;

pub use aggregate::AggregateRoot;
pub use entities::{Entity, ValueObject};
pub use errors::{DomainError, DomainResult};
pub use events::{DomainEvent, EventBuffer, EventMetadata};
pub use repositories::{EntityRepository, Repository, StorageDriver};
pub use unit_of_work::{
    with_transaction, ManagedUnitOfWork, TransactionBackend, TransactionOutcome, UnitOfWork,
    UnitOfWorkState,
};
pub use value_objects::{Engine, EntityId};
