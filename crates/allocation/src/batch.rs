use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use allocation_core::{BatchRef, Entity, OrderId, Sku, ValueObject};

/// One line of a customer order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(rename = "orderid")]
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

impl OrderLine {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, qty: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            qty,
        }
    }
}

impl ValueObject for OrderLine {}

/// A purchased quantity of one sku, in stock (`eta == None`) or arriving on `eta`.
///
/// Identity is the reference: two batches with the same reference compare equal
/// whatever their allocations.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: BatchRef,
    sku: Sku,
    eta: Option<NaiveDate>,
    purchased_quantity: u32,
    allocations: HashSet<OrderLine>,
}

impl Batch {
    pub fn new(
        reference: impl Into<BatchRef>,
        sku: impl Into<Sku>,
        qty: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            eta,
            purchased_quantity: qty,
            allocations: HashSet::new(),
        }
    }

    pub fn reference(&self) -> &BatchRef {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Expected arrival. `None` sorts before any date, so in-stock batches are
    /// preferred over shipments.
    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|l| i64::from(l.qty)).sum()
    }

    /// Negative only transiently, while a shrink is being compensated.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity()
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= i64::from(line.qty)
    }

    /// No-op when the line does not fit; callers select batches with
    /// `can_allocate` first.
    pub fn allocate(&mut self, line: OrderLine) {
        if self.can_allocate(&line) {
            self.allocations.insert(line);
        }
    }

    pub fn deallocate(&mut self, line: &OrderLine) {
        self.allocations.remove(line);
    }

    /// Remove an arbitrary allocation. `None` when nothing is allocated.
    pub fn deallocate_one(&mut self) -> Option<OrderLine> {
        let line = self.allocations.iter().next().cloned()?;
        self.allocations.remove(&line);
        Some(line)
    }

    /// Field-by-field comparison, unlike `==` which only compares references.
    pub fn same_state_as(&self, other: &Batch) -> bool {
        self.reference == other.reference
            && self.sku == other.sku
            && self.eta == other.eta
            && self.purchased_quantity == other.purchased_quantity
            && self.allocations == other.allocations
    }

    pub(crate) fn set_purchased_quantity(&mut self, qty: u32) {
        self.purchased_quantity = qty;
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity_as(other)
    }
}

impl Eq for Batch {}

impl core::hash::Hash for Batch {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

impl Entity for Batch {
    type Id = BatchRef;

    fn id(&self) -> &Self::Id {
        &self.reference
    }
}
