//! Snapshot transactions for the in-memory engine

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use tessera_domain::{
    errors::DomainResult,
    unit_of_work::{ManagedUnitOfWork, TransactionBackend},
    value_objects::Engine,
};

use super::store::{MemoryStore, StoreSnapshot};
use crate::error::PersistenceError;

/// Unit of work produced by [`super::MemoryDriver`]
pub type MemoryUnitOfWork = ManagedUnitOfWork<MemoryTransactionBackend>;

/// Snapshot on begin, restore on rollback, discard on commit
#[derive(Debug)]
pub struct MemoryTransactionBackend {
    engine: Engine,
    store: Arc<MemoryStore>,
    snapshot: Mutex<Option<StoreSnapshot>>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl MemoryTransactionBackend {
    /// Backend over `store`; `engine` names the driver in errors
    pub fn new(engine: Engine, store: Arc<MemoryStore>) -> Self {
        Self {
            engine,
            store,
            snapshot: Mutex::new(None),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
        }
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    fn take_snapshot(&self) -> Result<StoreSnapshot, PersistenceError> {
        self.snapshot
            .lock()
            .take()
            .ok_or_else(|| PersistenceError::MissingSnapshot {
                engine: self.engine.to_string(),
            })
    }
}

#[async_trait]
impl TransactionBackend for MemoryTransactionBackend {
    async fn begin(&self) -> DomainResult<()> {
        let mut snapshot = self.snapshot.lock();
        if snapshot.is_some() {
            return Err(PersistenceError::Transaction {
                engine: self.engine.to_string(),
                reason: "transaction already open".into(),
            }
            .into());
        }
        *snapshot = Some(self.store.snapshot());
        Ok(())
    }

    async fn commit(&self) -> DomainResult<()> {
        self.take_snapshot()?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> DomainResult<()> {
        let snapshot = self.take_snapshot()?;
        self.store.restore(snapshot);
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
