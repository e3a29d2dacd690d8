//! In-memory entity repository

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use tessera_domain::{
    entities::Entity,
    errors::{DomainError, DomainResult},
    repositories::{EntityRepository, Repository, StorageDriver},
    unit_of_work::UnitOfWork,
};

use super::driver::MemoryDriver;
use super::store::MemoryStore;
use crate::error::PersistenceError;

/// Repository storing `T` as JSON documents in one collection
///
/// When bound to a unit of work every operation requires that unit of work
/// to be active; unbound instances operate directly on the store.
pub struct MemoryRepository<T> {
    name: String,
    collection: String,
    driver: Arc<dyn StorageDriver>,
    store: Arc<MemoryStore>,
    uow: Option<Arc<dyn UnitOfWork>>,
    marker: PhantomData<fn() -> T>,
}

impl<T> MemoryRepository<T> {
    /// Repository named `name`, storing into a collection of the same name
    pub fn new(name: impl Into<String>, driver: Arc<MemoryDriver>) -> Self {
        let name = name.into();
        Self::with_collection(name.clone(), name, driver)
    }

    pub fn with_collection(
        name: impl Into<String>,
        collection: impl Into<String>,
        driver: Arc<MemoryDriver>,
    ) -> Self {
        let store = Arc::clone(driver.store());
        Self {
            name: name.into(),
            collection: collection.into(),
            driver,
            store,
            uow: None,
            marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of stored entities
    pub fn count(&self) -> usize {
        self.store.count(&self.collection)
    }

    fn ensure_usable(&self) -> DomainResult<()> {
        match &self.uow {
            Some(uow) if !uow.is_active() => Err(DomainError::TransactionNotActive),
            _ => Ok(()),
        }
    }
}

impl<T> fmt::Debug for MemoryRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("engine", self.driver.engine())
            .field("bound", &self.uow.is_some())
            .finish()
    }
}

impl<T: 'static> Repository for MemoryRepository<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }

    fn unit_of_work(&self) -> Option<&Arc<dyn UnitOfWork>> {
        self.uow.as_ref()
    }

    fn clone_with(&self, uow: Option<Arc<dyn UnitOfWork>>) -> Arc<dyn Repository> {
        Arc::new(Self {
            name: self.name.clone(),
            collection: self.collection.clone(),
            driver: Arc::clone(&self.driver),
            store: Arc::clone(&self.store),
            uow,
            marker: PhantomData,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T> MemoryRepository<T>
where
    T: Entity + Serialize + DeserializeOwned + Send + Sync + 'static,
    T::Id: fmt::Display + Send + Sync,
{
    /// Load an entity that must exist
    ///
    /// # Errors
    /// `EntityNotFound` when no entity has this id.
    pub async fn get(&self, id: &T::Id) -> DomainResult<T> {
        self.find_by_id(id).await?.ok_or_else(|| {
            PersistenceError::not_found(entity_name::<T>(), id.to_string()).into()
        })
    }
}

fn entity_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[async_trait]
impl<T> EntityRepository<T> for MemoryRepository<T>
where
    T: Entity + Serialize + DeserializeOwned + Send + Sync + 'static,
    T::Id: fmt::Display + Send + Sync,
{
    async fn save(&self, entity: &T) -> DomainResult<()> {
        self.ensure_usable()?;
        let document = serde_json::to_value(entity).map_err(PersistenceError::from)?;
        self.store
            .put(&self.collection, entity.id().to_string(), document);
        Ok(())
    }

    async fn find_by_id(&self, id: &T::Id) -> DomainResult<Option<T>> {
        self.ensure_usable()?;
        self.store
            .get(&self.collection, &id.to_string())
            .map(|document| serde_json::from_value(document).map_err(PersistenceError::from))
            .transpose()
            .map_err(DomainError::from)
    }

    async fn find_all(&self) -> DomainResult<Vec<T>> {
        self.ensure_usable()?;
        self.store
            .all(&self.collection)
            .into_iter()
            .map(|document| {
                serde_json::from_value(document)
                    .map_err(|e| DomainError::from(PersistenceError::from(e)))
            })
            .collect()
    }

    async fn delete(&self, id: &T::Id) -> DomainResult<()> {
        self.ensure_usable()?;
        self.store.remove(&self.collection, &id.to_string());
        Ok(())
    }

    async fn exists(&self, id: &T::Id) -> DomainResult<bool> {
        self.ensure_usable()?;
        Ok(self.store.contains(&self.collection, &id.to_string()))
    }
}
