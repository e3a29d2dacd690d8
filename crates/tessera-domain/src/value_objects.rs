//! Value objects representing immutable domain concepts

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// Typed UUID identifier
///
/// The type parameter ties an id to the entity it identifies, so an
/// `EntityId<Order>` cannot be passed where an `EntityId<Customer>` is
/// expected. It carries no data.
#[derive(Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct EntityId<T> {
    value: uuid::Uuid,
    #[serde(skip)]
    marker: PhantomData<fn() -> T>,
}

impl<T> EntityId<T> {
    /// Generate a new random (v4) id
    pub fn new() -> Self {
        Self::from_uuid(uuid::Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(value: uuid::Uuid) -> Self {
        Self {
            value,
            marker: PhantomData,
        }
    }

    /// Parse from the hyphenated string form
    pub fn parse(s: &str) -> DomainResult<Self> {
        uuid::Uuid::parse_str(s)
            .map(Self::from_uuid)
            .map_err(|e| DomainError::ValidationError {
                field: "id".to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.value
    }
}

impl<T> Clone for EntityId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntityId<T> {}

impl<T> PartialEq for EntityId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for EntityId<T> {}

impl<T> Hash for EntityId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.value)
    }
}

impl<T> fmt::Display for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Default for EntityId<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of a storage engine ("postgres", "memory", ...)
///
/// Normalized to trimmed lowercase so that drivers built from differently
/// cased configuration still compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Engine(String);

impl Engine {
    /// Create an engine name, rejecting blank input
    pub fn new(name: impl AsRef<str>) -> DomainResult<Self> {
        let normalized = name.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::ValidationError {
                field: "engine".to_string(),
                reason: "Engine name cannot be empty".to_string(),
            });
        }
        Ok(Self(normalized))
    }

    /// Engine name known at compile time
    ///
    /// Intended for driver constants; a blank name is a programming error.
    pub fn named(name: &'static str) -> Self {
        debug_assert!(!name.trim().is_empty(), "engine name cannot be blank");
        Self(name.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Engine {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Engine> for String {
    fn from(engine: Engine) -> Self {
        engine.0
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
