//! tessera persistence layer
//!
//! Coordinates repositories around a shared unit of work and ships an
//! in-memory engine implementing the domain contracts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ RepositoryProvider                                               │
//! │   register / get / has / unregister / clear                      │
//! │   bundle_transaction(names) ──┐                                  │
//! └───────────────────────────────┼──────────────────────────────────┘
//!                                 │ pairwise compatibility check
//!                                 │ one unit of work from the first driver
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ RepositoryBundle                                                 │
//! │   Arc<dyn UnitOfWork>  +  name -> repository bound to it          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessera_persistence::{memory::{MemoryDriver, MemoryRepository}, RepositoryProvider};
//!
//! let driver = Arc::new(MemoryDriver::new());
//! let provider = RepositoryProvider::new();
//! provider.register(Arc::new(MemoryRepository::<Order>::new("orders", driver.clone())))?;
//! provider.register(Arc::new(MemoryRepository::<Invoice>::new("invoices", driver)))?;
//!
//! let mut bundle = provider.bundle_transaction(["orders", "invoices"])?;
//! bundle.begin().await?;
//! let orders = bundle.get_as::<MemoryRepository<Order>>("orders")?;
//! orders.save(&order).await?;
//! bundle.dispose().await?;
//! ```

pub mod bundle;
pub mod error;
pub mod memory;
pub mod provider;

pub use bundle::RepositoryBundle;
pub use error::PersistenceError;
pub use provider::RepositoryProvider;
