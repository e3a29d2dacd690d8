//! Domain errors for tessera

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Validation error: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Business rule violation: {rule}")]
    BusinessRuleViolation { rule: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    EntityNotFound { entity_type: String, id: String },

    #[error("Repository not found: {name}")]
    RepositoryNotFound { name: String },

    #[error("Repository {name} is not a {expected}")]
    RepositoryTypeMismatch { name: String, expected: String },

    #[error(
        "Repositories {left} ({left_engine}) and {right} ({right_engine}) cannot share a transaction"
    )]
    IncompatibleRepositories {
        left: String,
        left_engine: String,
        right: String,
        right_engine: String,
    },

    #[error("Repository {repository} uses engine {actual} but the unit of work runs on {expected}")]
    EngineMismatch {
        repository: String,
        expected: String,
        actual: String,
    },

    #[error("Unit of work is not active")]
    TransactionNotActive,

    #[error("Unit of work is already active")]
    TransactionAlreadyActive,

    #[error("Transaction failed on {engine}: {reason}")]
    TransactionFailed { engine: String, reason: String },

    #[error("Storage error: {reason}")]
    Storage { reason: String },
}

impl DomainError {
    /// Shorthand for a configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Shorthand for a missing repository
    pub fn repository_not_found(name: impl Into<String>) -> Self {
        Self::RepositoryNotFound { name: name.into() }
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
