//! Product repository boundary.
//!
//! The core only depends on the `ProductRepository` contract; storage engines
//! plug in behind it. A repository instance lives for exactly one unit of work
//! and remembers every product it handed out or accepted (the *seen set*), so
//! the unit of work can harvest their outboxes after committing without the
//! repository knowing anything about messaging.

pub mod in_memory;

pub use in_memory::{InMemoryProductStore, InMemoryRepository};

use thiserror::Error;

use allocation_core::{BatchRef, Sku};
use allocation_domain::Product;

use crate::unit_of_work::UnitOfWorkState;

/// Storage operation error.
///
/// These are **infrastructure errors** (conflicts, duplicates, broken locks) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another unit of work committed the same product first.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A product was added for a sku that already exists.
    #[error("product already exists for sku {0}")]
    Duplicate(Sku),

    /// The unit of work was driven out of order (e.g. used before `begin`).
    #[error("operation not allowed in unit of work state {0:?}")]
    InvalidState(UnitOfWorkState),

    /// A lock guarding shared storage was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Aggregate-level access to products, keyed by sku.
///
/// Every successful `get`, `get_by_batchref` and `add` records the product in
/// the seen set; misses record nothing.
pub trait ProductRepository {
    /// Track a new product. It is persisted when the unit of work commits.
    fn add(&mut self, product: Product) -> Result<(), StorageError>;

    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, StorageError>;

    /// Secondary index: the product owning the batch `reference`.
    fn get_by_batchref(&mut self, reference: &BatchRef)
    -> Result<Option<&mut Product>, StorageError>;

    /// Products touched through this repository instance, in first-touch order.
    fn seen(&mut self) -> Vec<&mut Product>;

    /// Every stored product, plus any added in this session. Does not mark
    /// them as seen.
    fn list(&self) -> Result<Vec<Product>, StorageError>;
}
