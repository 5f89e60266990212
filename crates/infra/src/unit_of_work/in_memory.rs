use std::sync::Arc;

use tracing::debug;

use crate::repository::{InMemoryProductStore, InMemoryRepository, ProductRepository, StorageError};

use super::{UnitOfWork, UnitOfWorkFactory, UnitOfWorkState};

/// Unit of work over an `InMemoryProductStore`.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    store: Arc<InMemoryProductStore>,
    session: Option<InMemoryRepository>,
    state: UnitOfWorkState,
}

impl InMemoryUnitOfWork {
    pub fn new(store: Arc<InMemoryProductStore>) -> Self {
        Self {
            store,
            session: None,
            state: UnitOfWorkState::NotStarted,
        }
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    fn state(&self) -> UnitOfWorkState {
        self.state
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.state != UnitOfWorkState::NotStarted {
            return Err(StorageError::InvalidState(self.state));
        }
        self.session = Some(InMemoryRepository::new(self.store.clone()));
        self.state = UnitOfWorkState::Active;
        Ok(())
    }

    fn repository(&mut self) -> Option<&mut dyn ProductRepository> {
        self.session
            .as_mut()
            .map(|session| session as &mut dyn ProductRepository)
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let session = match (&self.state, &self.session) {
            (UnitOfWorkState::Active, Some(session)) => session,
            _ => return Err(StorageError::InvalidState(self.state)),
        };
        self.store.commit(session.pending_writes())?;
        self.state = UnitOfWorkState::Committed;
        Ok(())
    }

    fn rollback(&mut self) {
        if self.state == UnitOfWorkState::Active {
            self.session = None;
            self.state = UnitOfWorkState::RolledBack;
        }
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            debug!(state = ?self.state, "closing unit of work session");
        }
        self.state = UnitOfWorkState::Closed;
    }
}

/// Hands out units bound to one shared store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUnitOfWorkFactory {
    store: Arc<InMemoryProductStore>,
}

impl InMemoryUnitOfWorkFactory {
    pub fn new(store: Arc<InMemoryProductStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<InMemoryProductStore> {
        &self.store
    }
}

impl UnitOfWorkFactory for InMemoryUnitOfWorkFactory {
    type Uow = InMemoryUnitOfWork;

    fn create(&self) -> Self::Uow {
        InMemoryUnitOfWork::new(self.store.clone())
    }
}
