use allocation_core::{AggregateRoot, BatchRef, DomainError, DomainResult, Outbox, Sku};
use allocation_events::Message;

use crate::batch::{Batch, OrderLine};
use crate::messages::{
    Allocate, AllocationCommand, AllocationEvent, AllocationMessage, Allocated, OutOfStock,
};

/// Aggregate root: Product.
///
/// Owns every batch of one sku. Batches are only mutated through the methods
/// here; each method records what it did in the outbox.
#[derive(Debug, Clone)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,
    version_number: u64,
    messages: Vec<AllocationMessage>,
}

impl Product {
    pub fn new(sku: impl Into<Sku>, batches: Vec<Batch>) -> Self {
        Self::with_version(sku, batches, 0)
    }

    /// Rebuild a product loaded from storage at a known version.
    pub fn with_version(sku: impl Into<Sku>, batches: Vec<Batch>, version_number: u64) -> Self {
        Self {
            sku: sku.into(),
            batches,
            version_number,
            messages: Vec::new(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, reference: &BatchRef) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    pub fn has_batch(&self, reference: &BatchRef) -> bool {
        self.batch(reference).is_some()
    }

    pub fn version_number(&self) -> u64 {
        self.version_number
    }

    /// True when both hold identical batches at the same version. Pending
    /// messages are not compared.
    pub fn same_state_as(&self, other: &Product) -> bool {
        self.sku == other.sku
            && self.version_number == other.version_number
            && self.batches.len() == other.batches.len()
            && self
                .batches
                .iter()
                .zip(&other.batches)
                .all(|(a, b)| a.same_state_as(b))
    }

    pub fn add_batch(&mut self, batch: Batch) -> DomainResult<()> {
        if batch.sku() != &self.sku {
            return Err(DomainError::validation(format!(
                "batch {} is for sku {}, not {}",
                batch.reference(),
                batch.sku(),
                self.sku
            )));
        }
        if self.has_batch(batch.reference()) {
            return Err(DomainError::conflict(format!(
                "batch {} already exists",
                batch.reference()
            )));
        }
        self.batches.push(batch);
        Ok(())
    }

    /// Allocate `line` to the preferred batch that can hold it.
    ///
    /// Returns `None` (and records `OutOfStock`) when no batch fits.
    pub fn allocate(&mut self, line: &OrderLine) -> Option<BatchRef> {
        let Some(idx) = select_batch(&self.batches, line) else {
            self.messages
                .push(Message::Event(AllocationEvent::OutOfStock(OutOfStock {
                    sku: line.sku.clone(),
                })));
            return None;
        };

        let batch = &mut self.batches[idx];
        batch.allocate(line.clone());
        let reference = batch.reference().clone();

        self.version_number += 1;
        self.messages
            .push(Message::Event(AllocationEvent::Allocated(Allocated {
                order_id: line.order_id.clone(),
                sku: line.sku.clone(),
                qty: line.qty,
                batch_ref: reference.clone(),
            })));
        Some(reference)
    }

    /// Set a batch's purchased quantity, evicting allocations until it is no
    /// longer over-committed. Each evicted line is re-queued as an `Allocate`
    /// command so it can land in another batch.
    pub fn change_batch_quantity(&mut self, reference: &BatchRef, qty: u32) -> DomainResult<()> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| DomainError::not_found(format!("batch {reference}")))?;

        batch.set_purchased_quantity(qty);
        while batch.available_quantity() < 0 {
            let line = batch.deallocate_one().ok_or_else(|| {
                DomainError::invariant(format!(
                    "batch {reference} is over-committed with no allocations"
                ))
            })?;
            self.messages
                .push(Message::Command(AllocationCommand::Allocate(Allocate {
                    order_id: line.order_id,
                    sku: line.sku,
                    qty: line.qty,
                })));
        }
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = Sku;

    fn id(&self) -> &Self::Id {
        &self.sku
    }

    fn version(&self) -> u64 {
        self.version_number
    }
}

impl Outbox for Product {
    type Message = AllocationMessage;

    fn pending_messages(&self) -> &[Self::Message] {
        &self.messages
    }

    fn take_messages(&mut self) -> Vec<Self::Message> {
        std::mem::take(&mut self.messages)
    }
}

impl core::fmt::Display for Product {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "product with sku: {} and {} batches",
            self.sku,
            self.batches.len()
        )
    }
}

/// Greedy first-fit over the allocation priority (no eta, then earliest eta).
///
/// `min_by_key` keeps the first of equal keys, so ties resolve to insertion
/// order.
fn select_batch(batches: &[Batch], line: &OrderLine) -> Option<usize> {
    batches
        .iter()
        .enumerate()
        .filter(|(_, b)| b.can_allocate(line))
        .min_by_key(|(_, b)| b.eta())
        .map(|(idx, _)| idx)
}

/// Allocate against a loose set of batches, outside any aggregate.
pub fn allocate(line: &OrderLine, batches: &mut [Batch]) -> DomainResult<BatchRef> {
    let idx = select_batch(batches, line)
        .ok_or_else(|| DomainError::out_of_stock(line.sku.as_str()))?;
    let batch = &mut batches[idx];
    batch.allocate(line.clone());
    Ok(batch.reference().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        today().checked_add_days(Days::new(1)).unwrap()
    }

    fn later() -> NaiveDate {
        today().checked_add_days(Days::new(10)).unwrap()
    }

    fn available(product: &Product, reference: &str) -> i64 {
        product
            .batch(&BatchRef::new(reference))
            .unwrap()
            .available_quantity()
    }

    #[test]
    fn prefers_current_stock_batches_to_shipments() {
        let in_stock = Batch::new("in-stock-batch", "RETRO-CLOCK", 100, None);
        let shipment = Batch::new("shipment-batch", "RETRO-CLOCK", 100, Some(tomorrow()));
        let mut product = Product::new("RETRO-CLOCK", vec![shipment, in_stock]);

        let line = OrderLine::new("oref", "RETRO-CLOCK", 10);
        let reference = product.allocate(&line);

        assert_eq!(reference, Some(BatchRef::new("in-stock-batch")));
        assert_eq!(available(&product, "in-stock-batch"), 90);
        assert_eq!(available(&product, "shipment-batch"), 100);
    }

    #[test]
    fn prefers_earlier_batches() {
        let earliest = Batch::new("speedy-batch", "MINIMALIST-SPOON", 100, Some(today()));
        let medium = Batch::new("normal-batch", "MINIMALIST-SPOON", 100, Some(tomorrow()));
        let latest = Batch::new("slow-batch", "MINIMALIST-SPOON", 100, Some(later()));
        let mut product = Product::new("MINIMALIST-SPOON", vec![latest, medium, earliest]);

        let line = OrderLine::new("order1", "MINIMALIST-SPOON", 10);
        assert_eq!(product.allocate(&line), Some(BatchRef::new("speedy-batch")));

        assert_eq!(available(&product, "speedy-batch"), 90);
        assert_eq!(available(&product, "normal-batch"), 100);
        assert_eq!(available(&product, "slow-batch"), 100);
    }

    #[test]
    fn equal_priority_resolves_to_insertion_order() {
        let first = Batch::new("first", "TWIN-LAMP", 10, Some(today()));
        let second = Batch::new("second", "TWIN-LAMP", 10, Some(today()));
        let mut product = Product::new("TWIN-LAMP", vec![first, second]);

        let line = OrderLine::new("o1", "TWIN-LAMP", 5);
        assert_eq!(product.allocate(&line), Some(BatchRef::new("first")));
    }

    #[test]
    fn skips_preferred_batch_that_cannot_fit() {
        let small = Batch::new("small", "BIG-SOFA", 1, None);
        let big = Batch::new("big", "BIG-SOFA", 100, Some(tomorrow()));
        let mut product = Product::new("BIG-SOFA", vec![small, big]);

        let line = OrderLine::new("o1", "BIG-SOFA", 10);
        assert_eq!(product.allocate(&line), Some(BatchRef::new("big")));
    }

    #[test]
    fn allocate_records_allocated_event_and_bumps_version() {
        let mut product = Product::new("LAMP", vec![Batch::new("b1", "LAMP", 10, None)]);
        product.allocate(&OrderLine::new("o1", "LAMP", 3));

        assert_eq!(product.version_number(), 1);
        assert_eq!(
            product.take_messages(),
            vec![AllocationMessage::from(Allocated {
                order_id: "o1".into(),
                sku: "LAMP".into(),
                qty: 3,
                batch_ref: "b1".into(),
            })]
        );
        assert!(product.pending_messages().is_empty());
    }

    #[test]
    fn records_out_of_stock_event_if_cannot_allocate() {
        let batch = Batch::new("batch1", "SMALL-FORK", 10, Some(today()));
        let mut product = Product::new("SMALL-FORK", vec![batch]);
        product.allocate(&OrderLine::new("order1", "SMALL-FORK", 10));

        let reference = product.allocate(&OrderLine::new("order2", "SMALL-FORK", 1));

        assert_eq!(reference, None);
        assert_eq!(product.version_number(), 1);
        assert_eq!(
            product.pending_messages().last(),
            Some(&AllocationMessage::from(OutOfStock {
                sku: "SMALL-FORK".into()
            }))
        );
        assert_eq!(available(&product, "batch1"), 0);
    }

    #[test]
    fn shrinking_below_allocations_reallocates_excess() {
        let batch1 = Batch::new("batch1", "INDIFFERENT-TABLE", 50, None);
        let batch2 = Batch::new("batch2", "INDIFFERENT-TABLE", 50, Some(today()));
        let mut product = Product::new("INDIFFERENT-TABLE", vec![batch1, batch2]);
        product.allocate(&OrderLine::new("order1", "INDIFFERENT-TABLE", 20));
        product.allocate(&OrderLine::new("order2", "INDIFFERENT-TABLE", 20));
        product.take_messages();

        product
            .change_batch_quantity(&BatchRef::new("batch1"), 25)
            .unwrap();

        assert_eq!(available(&product, "batch1"), 5);
        let messages = product.take_messages();
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::Command(AllocationCommand::Allocate(cmd)) => {
                assert_eq!(cmd.sku.as_str(), "INDIFFERENT-TABLE");
                assert_eq!(cmd.qty, 20);
                assert!(["order1", "order2"].contains(&cmd.order_id.as_str()));
            }
            other => panic!("expected Allocate command, got {other:?}"),
        }
    }

    #[test]
    fn quantity_change_that_still_fits_emits_nothing() {
        let mut product = Product::new("CHAIR", vec![Batch::new("b1", "CHAIR", 50, None)]);
        product.allocate(&OrderLine::new("o1", "CHAIR", 20));
        product.take_messages();

        product.change_batch_quantity(&BatchRef::new("b1"), 20).unwrap();

        assert!(product.pending_messages().is_empty());
        assert_eq!(available(&product, "b1"), 0);
    }

    #[test]
    fn changing_unknown_batch_is_not_found() {
        let mut product = Product::new("CHAIR", vec![]);
        let err = product
            .change_batch_quantity(&BatchRef::new("nope"), 1)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn add_batch_rejects_foreign_sku_and_duplicates() {
        let mut product = Product::new("CHAIR", vec![]);
        product.add_batch(Batch::new("b1", "CHAIR", 1, None)).unwrap();

        let err = product
            .add_batch(Batch::new("b2", "TABLE", 1, None))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = product
            .add_batch(Batch::new("b1", "CHAIR", 5, None))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(product.batches().len(), 1);
    }

    #[test]
    fn loose_allocate_reports_out_of_stock_as_error() {
        let mut batches = vec![Batch::new("b1", "SMALL-FORK", 10, Some(today()))];
        allocate(&OrderLine::new("o1", "SMALL-FORK", 10), &mut batches).unwrap();

        let err = allocate(&OrderLine::new("o2", "SMALL-FORK", 1), &mut batches).unwrap_err();
        assert_eq!(err, DomainError::out_of_stock("SMALL-FORK"));
    }

    #[test]
    fn same_state_tracks_allocations_not_just_identity() {
        let original = Product::new("CHAIR", vec![Batch::new("b1", "CHAIR", 10, None)]);
        let mut copy = original.clone();
        assert!(copy.same_state_as(&original));

        copy.allocate(&OrderLine::new("o1", "CHAIR", 20));
        assert!(copy.same_state_as(&original));

        copy.allocate(&OrderLine::new("o2", "CHAIR", 2));
        assert!(!copy.same_state_as(&original));
        assert_eq!(copy.batches()[0], original.batches()[0]);
    }

    #[test]
    fn display_summarizes_batches() {
        let product = Product::new("CHAIR", vec![Batch::new("b1", "CHAIR", 1, None)]);
        assert_eq!(product.to_string(), "product with sku: CHAIR and 1 batches");
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn batch_specs() -> impl Strategy<Value = Vec<(u32, Option<u8>)>> {
            prop::collection::vec((0u32..100, prop::option::of(0u8..30)), 1..6)
        }

        fn build(specs: &[(u32, Option<u8>)]) -> Product {
            let batches = specs
                .iter()
                .enumerate()
                .map(|(i, (qty, eta))| {
                    let eta = eta.map(|d| today().checked_add_days(Days::new(d.into())).unwrap());
                    Batch::new(format!("b{i}"), "SKU", *qty, eta)
                })
                .collect();
            Product::new("SKU", batches)
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: no sequence of allocations over-commits a batch.
            #[test]
            fn allocation_never_goes_negative(
                specs in batch_specs(),
                lines in prop::collection::vec(1u32..40, 0..20)
            ) {
                let mut product = build(&specs);
                for (i, qty) in lines.iter().enumerate() {
                    product.allocate(&OrderLine::new(format!("o{i}"), "SKU", *qty));
                }
                for batch in product.batches() {
                    prop_assert!(batch.available_quantity() >= 0);
                }
            }

            /// Property: the chosen batch has the best priority among those that fit.
            #[test]
            fn chosen_batch_has_highest_priority(
                specs in batch_specs(),
                qty in 1u32..60
            ) {
                let mut product = build(&specs);
                let line = OrderLine::new("o1", "SKU", qty);
                let fitting: Vec<_> = product
                    .batches()
                    .iter()
                    .filter(|b| b.can_allocate(&line))
                    .map(|b| b.eta())
                    .collect();

                match product.allocate(&line) {
                    Some(reference) => {
                        let chosen = product.batch(&reference).unwrap().eta();
                        prop_assert!(fitting.iter().all(|eta| chosen <= *eta));
                    }
                    None => prop_assert!(fitting.is_empty()),
                }
            }

            /// Property: shrinking a batch always leaves it non-negative and
            /// re-queues exactly the evicted quantity.
            #[test]
            fn shrink_compensation_restores_invariant(
                lines in prop::collection::vec(1u32..20, 0..10),
                new_qty in 0u32..100
            ) {
                let mut product = build(&[(100, None)]);
                for (i, qty) in lines.iter().enumerate() {
                    product.allocate(&OrderLine::new(format!("o{i}"), "SKU", *qty));
                }
                let before = product.batches()[0].allocated_quantity();
                product.take_messages();

                product.change_batch_quantity(&BatchRef::new("b0"), new_qty).unwrap();

                let messages = product.take_messages();
                let batch = &product.batches()[0];
                prop_assert!(batch.available_quantity() >= 0);
                let requeued: i64 = messages
                    .iter()
                    .map(|m| match m {
                        Message::Command(AllocationCommand::Allocate(cmd)) => i64::from(cmd.qty),
                        _ => 0,
                    })
                    .sum();
                prop_assert_eq!(before - batch.allocated_quantity(), requeued);
            }
        }
    }
}
