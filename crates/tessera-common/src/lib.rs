//! Shared utilities for tessera crates
//!
//! - [`collection`]: lock-guarded map access used by registries
//! - [`error`]: `From` conversion macros
//! - [`logging`]: tracing subscriber setup and error chain formatting
//! - [`validation`]: validation traits and reusable validators

pub mod collection;
pub mod error;
pub mod logging;
pub mod validation;

pub use collection::{CollectionAccess, SyncMap};
pub use validation::{Validatable, ValidationError, Validator};
