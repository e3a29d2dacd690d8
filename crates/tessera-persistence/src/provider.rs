//! Repository provider
//!
//! Explicitly constructed registry of named repositories. Applications build
//! one provider and pass it to whatever needs repositories; there is no
//! process-wide instance.

use std::sync::Arc;

use tracing::{debug, info};

use tessera_common::{
    validation::{NonEmptyStringValidator, Validator},
    CollectionAccess, SyncMap,
};
use tessera_domain::{
    errors::{DomainError, DomainResult},
    repositories::Repository,
};

use crate::bundle::RepositoryBundle;

/// Registry of repositories by name
#[derive(Debug, Default)]
pub struct RepositoryProvider {
    repositories: SyncMap<String, Arc<dyn Repository>>,
}

impl RepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository under its own name
    ///
    /// Returns the repository previously registered under that name.
    ///
    /// # Errors
    /// `Configuration` when the repository name is blank.
    pub fn register(&self, repository: Arc<dyn Repository>) -> DomainResult<Option<Arc<dyn Repository>>> {
        NonEmptyStringValidator::new("repository name")
            .validate(repository.name())
            .map_err(|e| DomainError::configuration(e.to_string()))?;

        let name = repository.name().to_string();
        debug!(name = %name, engine = %repository.engine(), "registering repository");
        Ok(self.repositories.insert(name, repository))
    }

    /// Look up a repository
    pub fn get(&self, name: &str) -> DomainResult<Arc<dyn Repository>> {
        self.repositories
            .get(&name.to_string())
            .ok_or_else(|| DomainError::repository_not_found(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.repositories.contains(&name.to_string())
    }

    /// Remove a repository, returning it if it was registered
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Repository>> {
        self.repositories.remove(&name.to_string())
    }

    pub fn clear(&self) {
        self.repositories.clear();
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names = self.repositories.keys();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Bundle the named repositories around one shared unit of work
    ///
    /// Every pair of requested repositories must be compatible. The unit of
    /// work is built from the first repository's driver and must run on the
    /// engine every repository declares. The returned bundle is inactive.
    ///
    /// # Errors
    /// - `Configuration` when no name is given
    /// - `RepositoryNotFound` for an unregistered name
    /// - `IncompatibleRepositories` for the first incompatible pair, before
    ///   any unit of work is built
    /// - `EngineMismatch` when the built unit of work runs on another engine
    pub fn bundle_transaction<I, S>(&self, names: I) -> DomainResult<RepositoryBundle>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let repositories = names
            .into_iter()
            .map(|name| self.get(name.as_ref()))
            .collect::<DomainResult<Vec<_>>>()?;

        let Some(first) = repositories.first() else {
            return Err(DomainError::configuration(
                "bundle_transaction requires at least one repository name",
            ));
        };

        check_pairwise_compatibility(&repositories)?;

        let uow = first.build_unit_of_work();
        for repository in &repositories {
            if repository.engine() != uow.engine() {
                return Err(DomainError::EngineMismatch {
                    repository: repository.name().to_string(),
                    expected: uow.engine().to_string(),
                    actual: repository.engine().to_string(),
                });
            }
        }

        let mut bundle = RepositoryBundle::new(uow);
        for repository in &repositories {
            bundle.add(repository.as_ref());
        }

        info!(
            engine = %first.engine(),
            repositories = ?bundle.names(),
            "transaction bundle created"
        );
        Ok(bundle)
    }
}

fn check_pairwise_compatibility(repositories: &[Arc<dyn Repository>]) -> DomainResult<()> {
    for (index, left) in repositories.iter().enumerate() {
        for right in &repositories[index + 1..] {
            if !left.is_compatible_with(right.as_ref()) {
                return Err(DomainError::IncompatibleRepositories {
                    left: left.name().to_string(),
                    left_engine: left.engine().to_string(),
                    right: right.name().to_string(),
                    right_engine: right.engine().to_string(),
                });
            }
        }
    }
    Ok(())
}
