use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use allocation_core::{BatchRef, ExpectedVersion, Outbox, Sku};
use allocation_domain::Product;

use super::{ProductRepository, StorageError};

#[derive(Debug, Clone)]
struct StoredProduct {
    product: Product,
    /// Bumped on every committed write; the optimistic concurrency token.
    revision: u64,
}

/// A product write staged by a session, applied atomically on commit.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub product: Product,
    /// `None` for products added in the session (must not exist yet).
    pub expected: Option<ExpectedVersion>,
}

/// Shared in-memory product storage.
///
/// Intended for tests/dev. Sessions (`InMemoryRepository`) work on private
/// copies; this store is only touched on load and on commit.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    products: RwLock<HashMap<Sku, StoredProduct>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, as if each product had been committed once.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products
            .into_iter()
            .map(|product| {
                (
                    product.sku().clone(),
                    StoredProduct {
                        product,
                        revision: 1,
                    },
                )
            })
            .collect();
        Self {
            products: RwLock::new(products),
        }
    }

    /// Committed state of one product (test/dev inspection helper).
    pub fn product(&self, sku: &Sku) -> Option<Product> {
        self.load(sku).ok().flatten().map(|(product, _)| product)
    }

    pub fn len(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self, sku: &Sku) -> Result<Option<(Product, u64)>, StorageError> {
        let products = self.products.read().map_err(|_| StorageError::Poisoned)?;
        Ok(products
            .get(sku)
            .map(|stored| (stored.product.clone(), stored.revision)))
    }

    fn find_by_batchref(
        &self,
        reference: &BatchRef,
    ) -> Result<Option<(Product, u64)>, StorageError> {
        let products = self.products.read().map_err(|_| StorageError::Poisoned)?;
        Ok(products
            .values()
            .find(|stored| stored.product.has_batch(reference))
            .map(|stored| (stored.product.clone(), stored.revision)))
    }

    fn contains(&self, sku: &Sku) -> Result<bool, StorageError> {
        let products = self.products.read().map_err(|_| StorageError::Poisoned)?;
        Ok(products.contains_key(sku))
    }

    fn all(&self) -> Result<Vec<Product>, StorageError> {
        let products = self.products.read().map_err(|_| StorageError::Poisoned)?;
        Ok(products.values().map(|s| s.product.clone()).collect())
    }

    /// Apply all writes or none of them.
    pub(crate) fn commit(&self, writes: Vec<PendingWrite>) -> Result<(), StorageError> {
        let mut products = self.products.write().map_err(|_| StorageError::Poisoned)?;

        // Validate everything before touching anything.
        for write in &writes {
            let sku = write.product.sku();
            match (write.expected, products.get(sku)) {
                (None, Some(_)) => return Err(StorageError::Duplicate(sku.clone())),
                (None, None) => {}
                (Some(expected), Some(stored)) => {
                    expected
                        .check(stored.revision)
                        .map_err(|err| StorageError::Concurrency(format!("product {sku}: {err}")))?;
                }
                (Some(_), None) => {
                    return Err(StorageError::Concurrency(format!(
                        "product {sku} was removed concurrently"
                    )));
                }
            }
        }

        for write in writes {
            let sku = write.product.sku().clone();
            let revision = products.get(&sku).map(|s| s.revision).unwrap_or(0) + 1;
            products.insert(
                sku,
                StoredProduct {
                    product: write.product,
                    revision,
                },
            );
        }

        Ok(())
    }
}

#[derive(Debug)]
struct Tracked {
    product: Product,
    /// Store revision and state at load time; `None` if added in this session.
    loaded: Option<(u64, Product)>,
}

impl Tracked {
    fn is_unchanged(&self) -> bool {
        matches!(&self.loaded, Some((_, original)) if self.product.same_state_as(original))
    }
}

/// Session-scoped repository over an `InMemoryProductStore`.
///
/// Acts as an identity map: the first access to a sku copies it out of the
/// store, later accesses return the same copy. The identity map doubles as the
/// seen set.
#[derive(Debug)]
pub struct InMemoryRepository {
    store: Arc<InMemoryProductStore>,
    seen: Vec<Tracked>,
}

impl InMemoryRepository {
    pub fn new(store: Arc<InMemoryProductStore>) -> Self {
        Self {
            store,
            seen: Vec::new(),
        }
    }

    fn position(&self, sku: &Sku) -> Option<usize> {
        self.seen.iter().position(|t| t.product.sku() == sku)
    }

    fn track(&mut self, product: Product, revision: Option<u64>) -> usize {
        let loaded = revision.map(|revision| (revision, product.clone()));
        self.seen.push(Tracked { product, loaded });
        self.seen.len() - 1
    }

    /// Snapshot of every added or modified product, outboxes stripped, ready
    /// to store. Products only read in this session are left out so they do
    /// not bump the stored revision.
    pub(crate) fn pending_writes(&self) -> Vec<PendingWrite> {
        self.seen
            .iter()
            .filter(|tracked| !tracked.is_unchanged())
            .map(|tracked| {
                let mut product = tracked.product.clone();
                product.take_messages();
                PendingWrite {
                    product,
                    expected: tracked
                        .loaded
                        .as_ref()
                        .map(|(revision, _)| ExpectedVersion::Exact(*revision)),
                }
            })
            .collect()
    }
}

impl ProductRepository for InMemoryRepository {
    fn add(&mut self, product: Product) -> Result<(), StorageError> {
        let sku = product.sku();
        if self.position(sku).is_some() || self.store.contains(sku)? {
            return Err(StorageError::Duplicate(sku.clone()));
        }
        self.track(product, None);
        Ok(())
    }

    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, StorageError> {
        let idx = match self.position(sku) {
            Some(idx) => idx,
            None => match self.store.load(sku)? {
                Some((product, revision)) => self.track(product, Some(revision)),
                None => return Ok(None),
            },
        };
        Ok(Some(&mut self.seen[idx].product))
    }

    fn get_by_batchref(
        &mut self,
        reference: &BatchRef,
    ) -> Result<Option<&mut Product>, StorageError> {
        let idx = match self
            .seen
            .iter()
            .position(|t| t.product.has_batch(reference))
        {
            Some(idx) => idx,
            None => match self.store.find_by_batchref(reference)? {
                // Keep the session copy if the sku is already tracked.
                Some((product, revision)) => match self.position(product.sku()) {
                    Some(idx) => idx,
                    None => self.track(product, Some(revision)),
                },
                None => return Ok(None),
            },
        };
        Ok(Some(&mut self.seen[idx].product))
    }

    fn seen(&mut self) -> Vec<&mut Product> {
        self.seen.iter_mut().map(|t| &mut t.product).collect()
    }

    fn list(&self) -> Result<Vec<Product>, StorageError> {
        let mut by_sku: HashMap<Sku, Product> = self
            .store
            .all()?
            .into_iter()
            .map(|p| (p.sku().clone(), p))
            .collect();
        for tracked in &self.seen {
            by_sku.insert(tracked.product.sku().clone(), tracked.product.clone());
        }
        let mut products: Vec<Product> = by_sku.into_values().collect();
        products.sort_by(|a, b| a.sku().cmp(b.sku()));
        Ok(products)
    }
}
