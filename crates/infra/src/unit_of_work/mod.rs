//! Unit of work: the transaction boundary around one handler invocation.
//!
//! A unit binds one repository session. Lifecycle:
//!
//! ```text
//! NotStarted --begin--> Active --commit--> Committed --close--> Closed
//!                          \--rollback--> RolledBack --close--> Closed
//! ```
//!
//! `run_in_unit_of_work` is the only way the bus drives a unit: it commits on
//! success, rolls back on error, and rolls back from `Drop` if the work
//! unwinds or returns early.

pub mod in_memory;

pub use in_memory::{InMemoryUnitOfWork, InMemoryUnitOfWorkFactory};

use tracing::{debug, info};

use allocation_core::Outbox;
use allocation_domain::AllocationMessage;

use crate::repository::{ProductRepository, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
    Closed,
}

pub trait UnitOfWork {
    fn state(&self) -> UnitOfWorkState;

    /// Open the storage session. Only valid from `NotStarted`.
    fn begin(&mut self) -> Result<(), StorageError>;

    /// The bound session in any state; `None` once discarded or before `begin`.
    fn repository(&mut self) -> Option<&mut dyn ProductRepository>;

    /// Persist every added or modified product. On failure the unit stays
    /// `Active`.
    fn commit(&mut self) -> Result<(), StorageError>;

    /// Discard the session. No-op unless `Active`.
    fn rollback(&mut self);

    /// Release the session. Terminal.
    fn close(&mut self);

    fn products(&mut self) -> Result<&mut dyn ProductRepository, StorageError> {
        let state = self.state();
        if state != UnitOfWorkState::Active {
            return Err(StorageError::InvalidState(state));
        }
        self.repository().ok_or(StorageError::InvalidState(state))
    }

    /// Drain the outbox of every seen product, in seen order.
    fn collect_new_messages(&mut self) -> Vec<AllocationMessage> {
        let Some(repository) = self.repository() else {
            return Vec::new();
        };
        repository
            .seen()
            .into_iter()
            .flat_map(|product| product.take_messages())
            .collect()
    }
}

pub trait UnitOfWorkFactory: Send + Sync {
    type Uow: UnitOfWork;

    /// A fresh, `NotStarted` unit.
    fn create(&self) -> Self::Uow;
}

/// Rolls back and closes a unit that is dropped while still open.
struct ScopeGuard<U: UnitOfWork> {
    uow: U,
}

impl<U: UnitOfWork> Drop for ScopeGuard<U> {
    fn drop(&mut self) {
        if self.uow.state() == UnitOfWorkState::Active {
            debug!("rolling back unit of work");
            self.uow.rollback();
        }
        if self.uow.state() != UnitOfWorkState::Closed {
            self.uow.close();
        }
    }
}

/// Run `work` against a fresh repository session.
///
/// On `Ok` the unit commits and the messages produced by the seen products
/// are returned alongside the value. On `Err` (from `work` or from commit)
/// the unit rolls back and no messages are harvested.
pub fn run_in_unit_of_work<F, T, E>(
    factory: &F,
    work: impl FnOnce(&mut dyn ProductRepository) -> Result<T, E>,
) -> Result<(T, Vec<AllocationMessage>), E>
where
    F: UnitOfWorkFactory,
    E: From<StorageError>,
{
    let mut guard = ScopeGuard {
        uow: factory.create(),
    };
    guard.uow.begin()?;

    let value = work(guard.uow.products()?)?;

    guard.uow.commit()?;
    let messages = guard.uow.collect_new_messages();
    info!(harvested = messages.len(), "unit of work committed");

    Ok((value, messages))
}
