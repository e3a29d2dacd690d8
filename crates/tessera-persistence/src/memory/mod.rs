//! In-memory storage engine
//!
//! Collections of JSON documents behind a lock, with snapshot-based
//! transactions. Suitable for tests and development; transactions on one
//! store are not isolated from each other.

mod driver;
mod repository;
mod store;
mod transaction;

pub use driver::{MemoryDriver, MEMORY_ENGINE};
pub use repository::MemoryRepository;
pub use store::{Document, MemoryStore, StoreSnapshot};
pub use transaction::{MemoryTransactionBackend, MemoryUnitOfWork};
