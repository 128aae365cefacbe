//! Request-scoped transaction bookkeeping.
//!
//! Each request owns one [`TransactionCoordinator`]. The outermost call of a
//! request opens the transaction and is the only call allowed to end it;
//! nested calls observe that a transaction is already open and run inside it.

use std::any::Any;
use std::cell::Cell;
use std::fmt;

use tracing::warn;

use crate::dispatcher::DISPATCH_TARGET;
use crate::error::ServiceError;

/// Storage that can group a call's effects into one atomic unit.
///
/// Backends are per request, so implementations need not be thread-safe.
pub trait TransactionBackend: Any {
    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Fails when the storage cannot start a transaction.
    fn begin(&self) -> Result<(), ServiceError>;

    /// Makes the open transaction's effects durable.
    ///
    /// # Errors
    ///
    /// Fails when the storage cannot commit.
    fn commit(&self) -> Result<(), ServiceError>;

    /// Discards the open transaction's effects.
    ///
    /// # Errors
    ///
    /// Fails when the storage cannot roll back.
    fn rollback(&self) -> Result<(), ServiceError>;
}

/// Backend for requests that touch no storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl TransactionBackend for NoopBackend {
    fn begin(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    fn commit(&self) -> Result<(), ServiceError> {
        Ok(())
    }

    fn rollback(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Tracks whether the request currently has an open transaction.
pub struct TransactionCoordinator {
    backend: Box<dyn TransactionBackend>,
    open: Cell<bool>,
}

impl TransactionCoordinator {
    /// Wraps `backend`; no transaction is open initially.
    #[must_use]
    pub fn new(backend: impl TransactionBackend) -> Self {
        Self {
            backend: Box::new(backend),
            open: Cell::new(false),
        }
    }

    /// Returns `true` while a transaction is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.get()
    }

    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Fails if one is already open or the backend refuses.
    pub fn begin(&self) -> Result<(), ServiceError> {
        if self.is_open() {
            return Err(ServiceError::internal("a transaction is already open"));
        }
        self.backend.begin()?;
        self.open.set(true);
        Ok(())
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// Fails if none is open or the backend refuses.
    pub fn commit(&self) -> Result<(), ServiceError> {
        self.close()?;
        self.backend.commit()
    }

    /// Rolls back the open transaction.
    ///
    /// # Errors
    ///
    /// Fails if none is open or the backend refuses.
    pub fn rollback(&self) -> Result<(), ServiceError> {
        self.close()?;
        self.backend.rollback()
    }

    /// Opens a transaction owned by the caller, unless one is already open.
    ///
    /// Returns `None` for nested calls. The returned guard rolls back if it
    /// is dropped without being finished.
    ///
    /// # Errors
    ///
    /// Fails when the backend refuses to begin.
    pub fn begin_owned(&self) -> Result<Option<OwnedTransaction<'_>>, ServiceError> {
        if self.is_open() {
            return Ok(None);
        }
        self.begin()?;
        Ok(Some(OwnedTransaction {
            coordinator: self,
            finished: false,
        }))
    }

    /// Returns the backend as its concrete type.
    #[must_use]
    pub fn backend<B: TransactionBackend>(&self) -> Option<&B> {
        let backend: &dyn Any = &*self.backend;
        backend.downcast_ref::<B>()
    }

    fn close(&self) -> Result<(), ServiceError> {
        if !self.open.replace(false) {
            return Err(ServiceError::internal("no transaction is open"));
        }
        Ok(())
    }
}

impl fmt::Debug for TransactionCoordinator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransactionCoordinator")
            .field("open", &self.open.get())
            .finish_non_exhaustive()
    }
}

/// A transaction opened by, and ended by, one call.
#[derive(Debug)]
#[must_use = "dropping an unfinished transaction rolls it back"]
pub struct OwnedTransaction<'a> {
    coordinator: &'a TransactionCoordinator,
    finished: bool,
}

impl OwnedTransaction<'_> {
    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn commit(self) -> Result<(), ServiceError> {
        self.end(true)
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn rollback(self) -> Result<(), ServiceError> {
        self.end(false)
    }

    /// Commits when `commit` is `true`, otherwise rolls back.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn end(mut self, commit: bool) -> Result<(), ServiceError> {
        self.finished = true;
        if commit {
            self.coordinator.commit()
        } else {
            self.coordinator.rollback()
        }
    }
}

impl Drop for OwnedTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(error) = self.coordinator.rollback() {
            warn!(
                target: DISPATCH_TARGET,
                %error,
                "failed to roll back abandoned transaction"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;

    use super::*;
    use crate::tests::support::MockBackend as MockTransactionBackend;

    fn expect_begin(backend: &mut MockTransactionBackend, sequence: &mut Sequence) {
        backend
            .expect_begin()
            .times(1)
            .in_sequence(sequence)
            .returning(|| Ok(()));
    }

    #[test]
    fn owned_transaction_commits() {
        let mut backend = MockTransactionBackend::new();
        let mut sequence = Sequence::new();
        expect_begin(&mut backend, &mut sequence);
        backend
            .expect_commit()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(()));
        backend.expect_rollback().never();

        let coordinator = TransactionCoordinator::new(backend);
        let transaction = coordinator
            .begin_owned()
            .expect("begin")
            .expect("outermost call owns the transaction");
        assert!(coordinator.is_open());
        transaction.commit().expect("commit");
        assert!(!coordinator.is_open());
    }

    #[test]
    fn nested_begin_does_not_reopen() {
        let mut backend = MockTransactionBackend::new();
        let mut sequence = Sequence::new();
        expect_begin(&mut backend, &mut sequence);
        backend.expect_rollback().times(1).returning(|| Ok(()));

        let coordinator = TransactionCoordinator::new(backend);
        let outer = coordinator.begin_owned().expect("begin");
        assert!(outer.is_some());
        let inner = coordinator.begin_owned().expect("nested begin");
        assert!(inner.is_none());
        drop(outer);
    }

    #[test]
    fn abandoned_transaction_rolls_back() {
        let mut backend = MockTransactionBackend::new();
        let mut sequence = Sequence::new();
        expect_begin(&mut backend, &mut sequence);
        backend
            .expect_rollback()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|| Ok(()));
        backend.expect_commit().never();

        let coordinator = TransactionCoordinator::new(backend);
        {
            let _transaction = coordinator.begin_owned().expect("begin");
        }
        assert!(!coordinator.is_open());
    }

    #[test]
    fn failed_begin_leaves_no_transaction_open() {
        let mut backend = MockTransactionBackend::new();
        backend
            .expect_begin()
            .returning(|| Err(ServiceError::internal("storage offline")));

        let coordinator = TransactionCoordinator::new(backend);
        assert!(coordinator.begin_owned().is_err());
        assert!(!coordinator.is_open());
    }

    #[test]
    fn closing_without_an_open_transaction_fails() {
        let coordinator = TransactionCoordinator::new(NoopBackend);
        assert!(coordinator.commit().is_err());
        assert!(coordinator.rollback().is_err());
    }

    #[test]
    fn backend_downcasts_to_its_concrete_type() {
        let coordinator = TransactionCoordinator::new(NoopBackend);
        assert!(coordinator.backend::<NoopBackend>().is_some());
        assert!(coordinator.backend::<MockTransactionBackend>().is_none());
    }
}
