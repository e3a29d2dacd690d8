//! In-memory storage driver

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tessera_domain::{
    repositories::StorageDriver, unit_of_work::UnitOfWork, value_objects::Engine,
};

use super::store::MemoryStore;
use super::transaction::{MemoryTransactionBackend, MemoryUnitOfWork};

/// Engine name reported by [`MemoryDriver::new`]
pub const MEMORY_ENGINE: &str = "memory";

const DEFAULT_CONTEXT: &str = "default";

/// Driver over a shared [`MemoryStore`]
///
/// Every unit of work it builds snapshots the same store, so repositories
/// created from one driver see each other's writes.
#[derive(Debug)]
pub struct MemoryDriver {
    engine: Engine,
    context_type: String,
    store: Arc<MemoryStore>,
    units_built: AtomicUsize,
}

impl MemoryDriver {
    /// Driver for the `memory` engine with the default context
    pub fn new() -> Self {
        Self::with_engine(Engine::named(MEMORY_ENGINE), DEFAULT_CONTEXT)
    }

    /// Driver reporting a custom engine and context type
    ///
    /// Useful to model several logical databases in tests.
    pub fn with_engine(engine: Engine, context_type: impl Into<String>) -> Self {
        Self {
            engine,
            context_type: context_type.into(),
            store: Arc::new(MemoryStore::new()),
            units_built: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Number of units of work built so far
    pub fn units_built(&self) -> usize {
        self.units_built.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageDriver for MemoryDriver {
    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn context_type(&self) -> &str {
        &self.context_type
    }

    fn build_unit_of_work(&self) -> Arc<dyn UnitOfWork> {
        self.units_built.fetch_add(1, Ordering::SeqCst);
        let uow: MemoryUnitOfWork = MemoryUnitOfWork::new(
            self.engine.clone(),
            self.context_type.clone(),
            MemoryTransactionBackend::new(self.engine.clone(), Arc::clone(&self.store)),
        );
        Arc::new(uow)
    }
}
