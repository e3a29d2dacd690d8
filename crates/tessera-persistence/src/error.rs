//! Persistence layer error types
//!
//! Mapped into `DomainError` at the repository boundary

use thiserror::Error;

use tessera_domain::errors::DomainError;

/// Errors raised inside storage engines
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Commit or rollback requested with no snapshot to settle
    #[error("No transaction snapshot on {engine}")]
    MissingSnapshot { engine: String },

    /// Transaction primitive misuse inside an engine
    #[error("Transaction error on {engine}: {reason}")]
    Transaction { engine: String, reason: String },
}

impl PersistenceError {
    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }
}

impl From<PersistenceError> for DomainError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity_type, id } => DomainError::EntityNotFound {
                entity_type: entity_type.to_string(),
                id,
            },
            PersistenceError::Serialization(e) => DomainError::Storage {
                reason: format!("serialization failed: {}", e),
            },
            PersistenceError::MissingSnapshot { engine } => DomainError::TransactionFailed {
                engine,
                reason: "no snapshot to settle".to_string(),
            },
            PersistenceError::Transaction { engine, reason } => {
                DomainError::TransactionFailed { engine, reason }
            }
        }
    }
}
