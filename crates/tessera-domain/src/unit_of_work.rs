//! Unit of work
//!
//! A unit of work is one logical transaction over a single storage engine.
//!
//! ```text
//!              begin()              fail(reason)
//!  Inactive ───────────▶ Active ───────────────▶ RollbackOnly
//!     ▲                    │                          │
//!     │      end(): commit │                          │ end(): rollback
//!     └────────────────────┴──────────────────────────┘
//! ```
//!
//! Drivers implement [`TransactionBackend`] with their engine primitives and
//! get the state machine from [`ManagedUnitOfWork`].

use std::fmt::Debug;
use std::future::Future;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::Engine;

/// Lifecycle state of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitOfWorkState {
    Inactive,
    Active,
    RollbackOnly,
}

/// How a transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
}

/// Transactional scope shared by every repository of a bundle
#[async_trait]
pub trait UnitOfWork: Send + Sync + Debug {
    /// Engine this unit of work runs on
    fn engine(&self) -> &Engine;

    /// Driver context type (connection kind, schema, ...)
    fn context_type(&self) -> &str;

    /// Current state
    fn state(&self) -> UnitOfWorkState;

    /// True while a transaction is open, including rollback-only
    fn is_active(&self) -> bool {
        self.state() != UnitOfWorkState::Inactive
    }

    /// True when the next `end()` will roll back
    fn is_rollback_only(&self) -> bool {
        self.state() == UnitOfWorkState::RollbackOnly
    }

    /// Reason given to the most recent `fail()`, if any
    fn failure_reason(&self) -> Option<String>;

    /// Open a transaction
    ///
    /// # Errors
    /// `TransactionAlreadyActive` when a transaction is open, or the
    /// backend's error when the engine refuses to begin.
    async fn begin(&self) -> DomainResult<()>;

    /// Mark the open transaction rollback-only. Never fails.
    fn fail(&self, reason: &str);

    /// Commit, or roll back when rollback-only, then return to inactive
    ///
    /// # Errors
    /// `TransactionNotActive` when nothing is open, or the backend's error.
    /// The unit of work is inactive afterwards either way.
    async fn end(&self) -> DomainResult<TransactionOutcome>;
}

/// Engine-specific transaction primitives
#[async_trait]
pub trait TransactionBackend: Send + Sync + Debug {
    async fn begin(&self) -> DomainResult<()>;
    async fn commit(&self) -> DomainResult<()>;
    async fn rollback(&self) -> DomainResult<()>;
}

/// Backend call in flight; claimed under the lock before awaiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Beginning,
    Ending,
}

#[derive(Debug)]
struct Lifecycle {
    state: UnitOfWorkState,
    transition: Option<Transition>,
    failure_reason: Option<String>,
    last_outcome: Option<TransactionOutcome>,
}

/// [`UnitOfWork`] state machine over a [`TransactionBackend`]
#[derive(Debug)]
pub struct ManagedUnitOfWork<B> {
    engine: Engine,
    context_type: String,
    backend: B,
    lifecycle: Mutex<Lifecycle>,
}

impl<B: TransactionBackend> ManagedUnitOfWork<B> {
    pub fn new(engine: Engine, context_type: impl Into<String>, backend: B) -> Self {
        Self {
            engine,
            context_type: context_type.into(),
            backend,
            lifecycle: Mutex::new(Lifecycle {
                state: UnitOfWorkState::Inactive,
                transition: None,
                failure_reason: None,
                last_outcome: None,
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Outcome of the last completed `end()`
    pub fn last_outcome(&self) -> Option<TransactionOutcome> {
        self.lifecycle.lock().last_outcome
    }

    fn finish(&self, outcome: TransactionOutcome) {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = UnitOfWorkState::Inactive;
        lifecycle.transition = None;
        lifecycle.last_outcome = Some(outcome);
    }
}

#[async_trait]
impl<B: TransactionBackend> UnitOfWork for ManagedUnitOfWork<B> {
    fn engine(&self) -> &Engine {
        &self.engine
    }

    fn context_type(&self) -> &str {
        &self.context_type
    }

    fn state(&self) -> UnitOfWorkState {
        self.lifecycle.lock().state
    }

    fn failure_reason(&self) -> Option<String> {
        self.lifecycle.lock().failure_reason.clone()
    }

    async fn begin(&self) -> DomainResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != UnitOfWorkState::Inactive || lifecycle.transition.is_some() {
                return Err(DomainError::TransactionAlreadyActive);
            }
            lifecycle.transition = Some(Transition::Beginning);
        }

        let result = self.backend.begin().await;

        let mut lifecycle = self.lifecycle.lock();
        lifecycle.transition = None;
        result?;
        lifecycle.state = UnitOfWorkState::Active;
        lifecycle.failure_reason = None;
        debug!(engine = %self.engine, "unit of work begun");
        Ok(())
    }

    fn fail(&self, reason: &str) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.transition == Some(Transition::Ending) {
            warn!(engine = %self.engine, reason, "fail() called while unit of work is ending");
            return;
        }
        match lifecycle.state {
            UnitOfWorkState::Active => {
                lifecycle.state = UnitOfWorkState::RollbackOnly;
                lifecycle.failure_reason = Some(reason.to_string());
                debug!(engine = %self.engine, reason, "unit of work marked rollback-only");
            }
            UnitOfWorkState::RollbackOnly => {
                // First reason wins; later ones are usually consequences.
                debug!(engine = %self.engine, reason, "unit of work already rollback-only");
            }
            UnitOfWorkState::Inactive => {
                warn!(engine = %self.engine, reason, "fail() called on inactive unit of work");
            }
        }
    }

    async fn end(&self) -> DomainResult<TransactionOutcome> {
        let state = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == UnitOfWorkState::Inactive || lifecycle.transition.is_some() {
                return Err(DomainError::TransactionNotActive);
            }
            lifecycle.transition = Some(Transition::Ending);
            lifecycle.state
        };

        match state {
            UnitOfWorkState::Inactive => Err(DomainError::TransactionNotActive),
            UnitOfWorkState::Active => {
                if let Err(commit_err) = self.backend.commit().await {
                    warn!(engine = %self.engine, error = %commit_err, "commit failed, rolling back");
                    if let Err(rollback_err) = self.backend.rollback().await {
                        warn!(engine = %self.engine, error = %rollback_err, "rollback after failed commit also failed");
                    }
                    self.finish(TransactionOutcome::RolledBack);
                    return Err(commit_err);
                }
                self.finish(TransactionOutcome::Committed);
                debug!(engine = %self.engine, "unit of work committed");
                Ok(TransactionOutcome::Committed)
            }
            UnitOfWorkState::RollbackOnly => {
                let result = self.backend.rollback().await;
                self.finish(TransactionOutcome::RolledBack);
                result?;
                debug!(engine = %self.engine, "unit of work rolled back");
                Ok(TransactionOutcome::RolledBack)
            }
        }
    }
}

/// Run `f` inside a transaction
///
/// Begins `uow`, awaits `f`, and ends the unit of work. When `f` returns an
/// error the unit of work is marked rollback-only before ending and the
/// original error is returned.
pub async fn with_transaction<U, F, Fut, T>(uow: &U, f: F) -> DomainResult<T>
where
    U: UnitOfWork + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    uow.begin().await?;

    match f().await {
        Ok(value) => {
            uow.end().await?;
            Ok(value)
        }
        Err(err) => {
            uow.fail(&err.to_string());
            if let Err(end_err) = uow.end().await {
                warn!(engine = %uow.engine(), error = %end_err, "rollback failed after transaction error");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingBackend {
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        fail_commit: AtomicBool,
    }

    #[async_trait]
    impl TransactionBackend for CountingBackend {
        async fn begin(&self) -> DomainResult<()> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(())
        }

        async fn commit(&self) -> DomainResult<()> {
            tokio::task::yield_now().await;
            if self.fail_commit.load(Ordering::SeqCst) {
                return Err(DomainError::TransactionFailed {
                    engine: "test".into(),
                    reason: "disk full".into(),
                });
            }
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(&self) -> DomainResult<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn unit() -> ManagedUnitOfWork<CountingBackend> {
        ManagedUnitOfWork::new(Engine::new("test").unwrap(), "default", CountingBackend::default())
    }

    #[tokio::test]
    async fn test_begin_end_commits() {
        let uow = unit();
        assert_eq!(uow.state(), UnitOfWorkState::Inactive);

        uow.begin().await.unwrap();
        assert!(uow.is_active());
        assert!(!uow.is_rollback_only());

        let outcome = uow.end().await.unwrap();
        assert_eq!(outcome, TransactionOutcome::Committed);
        assert_eq!(uow.state(), UnitOfWorkState::Inactive);
        assert_eq!(uow.backend().commits.load(Ordering::SeqCst), 1);
        assert_eq!(uow.last_outcome(), Some(TransactionOutcome::Committed));
    }

    #[tokio::test]
    async fn test_fail_turns_end_into_rollback() {
        let uow = unit();
        uow.begin().await.unwrap();
        uow.fail("validation failed");
        uow.fail("second reason");

        assert!(uow.is_rollback_only());
        assert!(uow.is_active());
        assert_eq!(uow.failure_reason().as_deref(), Some("validation failed"));

        assert_eq!(uow.end().await.unwrap(), TransactionOutcome::RolledBack);
        assert!(!uow.is_active());
        assert_eq!(uow.backend().rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(uow.backend().commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_transitions() {
        let uow = unit();
        assert_eq!(uow.end().await, Err(DomainError::TransactionNotActive));

        uow.fail("ignored while inactive");
        assert_eq!(uow.state(), UnitOfWorkState::Inactive);

        uow.begin().await.unwrap();
        assert_eq!(uow.begin().await, Err(DomainError::TransactionAlreadyActive));
        assert_eq!(uow.backend().begins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_and_deactivates() {
        let uow = unit();
        uow.backend().fail_commit.store(true, Ordering::SeqCst);
        uow.begin().await.unwrap();

        let err = uow.end().await.unwrap_err();
        assert!(matches!(err, DomainError::TransactionFailed { .. }));
        assert!(!uow.is_active());
        assert_eq!(uow.backend().rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(uow.last_outcome(), Some(TransactionOutcome::RolledBack));
    }

    #[tokio::test]
    async fn test_with_transaction_commits_on_success() {
        let uow = unit();
        let value = with_transaction(&uow, || async { Ok(42) }).await.unwrap();

        assert_eq!(value, 42);
        assert!(!uow.is_active());
        assert_eq!(uow.last_outcome(), Some(TransactionOutcome::Committed));
    }

    #[tokio::test]
    async fn test_with_transaction_rolls_back_on_error() {
        let uow = unit();
        let result: DomainResult<()> = with_transaction(&uow, || async {
            Err(DomainError::BusinessRuleViolation {
                rule: "stock cannot go negative".into(),
            })
        })
        .await;

        assert!(matches!(result, Err(DomainError::BusinessRuleViolation { .. })));
        assert!(!uow.is_active());
        assert_eq!(uow.last_outcome(), Some(TransactionOutcome::RolledBack));
        assert!(uow
            .failure_reason()
            .unwrap()
            .contains("stock cannot go negative"));
    }

    #[tokio::test]
    async fn test_begin_after_end_clears_failure() {
        let uow = unit();
        uow.begin().await.unwrap();
        uow.fail("boom");
        uow.end().await.unwrap();

        uow.begin().await.unwrap();
        assert_eq!(uow.failure_reason(), None);
        assert_eq!(uow.state(), UnitOfWorkState::Active);
    }

    #[tokio::test]
    async fn test_overlapping_begins_open_one_transaction() {
        let uow = unit();
        let (first, second) = tokio::join!(uow.begin(), uow.begin());

        assert!(first.is_ok());
        assert_eq!(second, Err(DomainError::TransactionAlreadyActive));
        assert_eq!(uow.backend().begins.load(Ordering::SeqCst), 1);
        assert_eq!(uow.state(), UnitOfWorkState::Active);
    }

    #[tokio::test]
    async fn test_overlapping_ends_commit_once() {
        let uow = unit();
        uow.begin().await.unwrap();

        let (first, second) = tokio::join!(uow.end(), uow.end());
        assert_eq!(first, Ok(TransactionOutcome::Committed));
        assert_eq!(second, Err(DomainError::TransactionNotActive));
        assert_eq!(uow.backend().commits.load(Ordering::SeqCst), 1);
        assert!(!uow.is_active());
    }

    #[tokio::test]
    async fn test_fail_while_ending_does_not_change_outcome() {
        let uow = unit();
        uow.begin().await.unwrap();

        let (outcome, _) = tokio::join!(uow.end(), async { uow.fail("too late") });
        assert_eq!(outcome, Ok(TransactionOutcome::Committed));
        assert_eq!(uow.failure_reason(), None);
        assert_eq!(uow.state(), UnitOfWorkState::Inactive);
    }
}
