//! Repository and storage driver contracts
//!
//! Infrastructure implements these interfaces; the domain layer only defines
//! them. A [`StorageDriver`] knows how to talk to one engine and how to open
//! a unit of work on it. A [`Repository`] is a named, stateless accessor on
//! top of a driver, optionally bound to a unit of work.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::Entity;
use crate::errors::DomainResult;
use crate::unit_of_work::UnitOfWork;
use crate::value_objects::Engine;

/// Connection to a storage engine
pub trait StorageDriver: Send + Sync + Debug {
    /// Engine this driver talks to
    fn engine(&self) -> &Engine;

    /// Context type within the engine (schema, connection kind, ...)
    fn context_type(&self) -> &str;

    /// Build a fresh, inactive unit of work
    fn build_unit_of_work(&self) -> Arc<dyn UnitOfWork>;

    /// Whether both drivers can take part in one transaction
    fn is_compatible_with(&self, other: &dyn StorageDriver) -> bool {
        self.engine() == other.engine() && self.context_type() == other.context_type()
    }
}

/// Named data accessor bound to a driver
///
/// Repositories are cheap to clone: [`Repository::clone_with`] yields a new
/// instance sharing the driver but scoped to the given unit of work. The
/// original is never mutated.
pub trait Repository: Send + Sync + Debug + Any {
    /// Registration name
    fn name(&self) -> &str;

    /// Underlying driver
    fn driver(&self) -> &Arc<dyn StorageDriver>;

    /// Unit of work this instance is bound to
    fn unit_of_work(&self) -> Option<&Arc<dyn UnitOfWork>>;

    /// Clone this repository bound to `uow` (or unbound with `None`)
    fn clone_with(&self, uow: Option<Arc<dyn UnitOfWork>>) -> Arc<dyn Repository>;

    /// Downcasting support for typed lookups
    fn as_any(&self) -> &dyn Any;

    fn engine(&self) -> &Engine {
        self.driver().engine()
    }

    fn build_unit_of_work(&self) -> Arc<dyn UnitOfWork> {
        self.driver().build_unit_of_work()
    }

    fn is_compatible_with(&self, other: &dyn Repository) -> bool {
        self.driver().is_compatible_with(other.driver().as_ref())
    }
}

/// CRUD contract for repositories of one entity type
#[async_trait]
pub trait EntityRepository<T>: Repository
where
    T: Entity + Send + Sync + 'static,
    T::Id: Send + Sync,
{
    /// Insert or replace
    async fn save(&self, entity: &T) -> DomainResult<()>;

    /// Find by id; a missing entity is `Ok(None)`
    async fn find_by_id(&self, id: &T::Id) -> DomainResult<Option<T>>;

    async fn find_all(&self) -> DomainResult<Vec<T>>;

    /// Delete by id; deleting a missing entity succeeds
    async fn delete(&self, id: &T::Id) -> DomainResult<()>;

    async fn exists(&self, id: &T::Id) -> DomainResult<bool>;
}
