//! Repository bundle
//!
//! A set of repositories bound to one shared unit of work. Lookups are only
//! allowed while the unit of work is active, so repository calls cannot run
//! outside a transaction boundary.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use tessera_domain::{
    errors::{DomainError, DomainResult},
    repositories::Repository,
    unit_of_work::{TransactionOutcome, UnitOfWork},
};

/// Repositories sharing one unit of work
#[derive(Debug)]
pub struct RepositoryBundle {
    uow: Arc<dyn UnitOfWork>,
    repositories: HashMap<String, Arc<dyn Repository>>,
}

impl RepositoryBundle {
    /// Create an empty bundle around an inactive unit of work
    pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
        Self {
            uow,
            repositories: HashMap::new(),
        }
    }

    /// Bind a clone of `repository` to this bundle's unit of work
    ///
    /// The caller's instance is left untouched. A repository registered
    /// under the same name is replaced.
    pub fn add(&mut self, repository: &dyn Repository) {
        let bound = repository.clone_with(Some(Arc::clone(&self.uow)));
        self.repositories.insert(repository.name().to_string(), bound);
    }

    /// Shared unit of work
    pub fn unit_of_work(&self) -> &Arc<dyn UnitOfWork> {
        &self.uow
    }

    pub fn is_active(&self) -> bool {
        self.uow.is_active()
    }

    /// Begin the shared unit of work
    pub async fn begin(&self) -> DomainResult<()> {
        self.uow.begin().await
    }

    /// Mark the shared unit of work rollback-only
    pub fn fail(&self, reason: &str) {
        self.uow.fail(reason);
    }

    /// Look up a bound repository
    ///
    /// # Errors
    /// `TransactionNotActive` before `begin()`, `RepositoryNotFound` for a
    /// name that is not part of the bundle.
    pub fn get(&self, name: &str) -> DomainResult<Arc<dyn Repository>> {
        self.ensure_active()?;
        self.repositories
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::repository_not_found(name))
    }

    /// Look up a bound repository as its concrete type
    pub fn get_as<R: Repository>(&self, name: &str) -> DomainResult<&R> {
        self.ensure_active()?;
        let repository = self
            .repositories
            .get(name)
            .ok_or_else(|| DomainError::repository_not_found(name))?;
        repository
            .as_any()
            .downcast_ref::<R>()
            .ok_or_else(|| DomainError::RepositoryTypeMismatch {
                name: name.to_string(),
                expected: std::any::type_name::<R>().to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.repositories.contains_key(name)
    }

    /// Names of the bound repositories, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repositories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// End the unit of work and release every binding
    ///
    /// Commits unless the unit of work is rollback-only. A unit of work that
    /// was never begun (or already ended) is left alone and `Ok(None)` is
    /// returned. Bindings are cleared even when ending fails.
    pub async fn dispose(&mut self) -> DomainResult<Option<TransactionOutcome>> {
        let result = if self.uow.is_active() {
            self.uow.end().await.map(Some)
        } else {
            Ok(None)
        };
        self.repositories.clear();
        debug!(engine = %self.uow.engine(), ?result, "repository bundle disposed");
        result
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.uow.is_active() {
            return Err(DomainError::TransactionNotActive);
        }
        Ok(())
    }
}

impl Drop for RepositoryBundle {
    fn drop(&mut self) {
        if self.uow.is_active() {
            warn!(
                engine = %self.uow.engine(),
                repositories = ?self.names(),
                "repository bundle dropped with an open transaction; call dispose()"
            );
        }
    }
}
