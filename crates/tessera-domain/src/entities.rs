//! Entities and value objects
//!
//! Entities are compared by identity, value objects by their contents.

use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use crate::errors::DomainResult;

/// An object defined by its identity rather than its attributes
pub trait Entity {
    /// Identifier type
    type Id: Clone + Eq + Hash + Debug;

    /// Immutable identity
    fn id(&self) -> &Self::Id;

    /// True when both values denote the same entity, whatever their state
    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// An immutable object defined only by its attributes
///
/// Equality and hashing come from the derived `Eq`/`Hash` impls, so two
/// value objects with the same fields are interchangeable.
pub trait ValueObject: Clone + Eq + Hash + Debug {
    /// Check invariants; called by constructors
    fn validate(&self) -> DomainResult<()> {
        Ok(())
    }

    /// Stable-within-process hash of the value
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Structural equality
    fn same_value(&self, other: &Self) -> bool {
        self == other
    }
}
