//! Message handlers.
//!
//! Command handlers receive the repository of the unit of work they run in
//! and never commit themselves. Event handlers take their collaborators as
//! arguments; `bootstrap` binds those.

use serde_json::Value as JsonValue;
use tracing::info;

use allocation_core::DomainError;
use allocation_domain::{
    Allocate, Allocated, Batch, ChangeBatchQuantity, CreateBatch, OrderLine, OutOfStock, Product,
};
use allocation_events::EventBus;

use crate::message_bus::{CommandResult, HandlerError};
use crate::notifications::Notifier;
use crate::repository::ProductRepository;

/// Add a batch, creating its product on first sight of the sku.
///
/// Batch references are unique across every product.
pub fn add_batch(
    command: &CreateBatch,
    products: &mut dyn ProductRepository,
) -> Result<CommandResult, HandlerError> {
    if let Some(owner) = products.get_by_batchref(&command.reference)? {
        return Err(DomainError::conflict(format!(
            "batch {} already exists for sku {}",
            command.reference,
            owner.sku()
        ))
        .into());
    }

    let batch = Batch::new(
        command.reference.clone(),
        command.sku.clone(),
        command.qty,
        command.eta,
    );

    match products.get(&command.sku)? {
        Some(product) => product.add_batch(batch)?,
        None => {
            let mut product = Product::new(command.sku.clone(), Vec::new());
            product.add_batch(batch)?;
            products.add(product)?;
        }
    }

    info!(batch = %command.reference, sku = %command.sku, qty = command.qty, "batch added");
    Ok(None)
}

pub fn allocate(
    command: &Allocate,
    products: &mut dyn ProductRepository,
) -> Result<CommandResult, HandlerError> {
    let line = OrderLine::new(command.order_id.clone(), command.sku.clone(), command.qty);
    let product = products
        .get(&line.sku)?
        .ok_or_else(|| DomainError::invalid_sku(line.sku.as_str()))?;

    let batch_ref = product.allocate(&line);
    match &batch_ref {
        Some(reference) => info!(order = %line.order_id, batch = %reference, "line allocated"),
        None => info!(order = %line.order_id, sku = %line.sku, "out of stock"),
    }
    Ok(batch_ref)
}

pub fn change_batch_quantity(
    command: &ChangeBatchQuantity,
    products: &mut dyn ProductRepository,
) -> Result<CommandResult, HandlerError> {
    let product = products
        .get_by_batchref(&command.reference)?
        .ok_or_else(|| DomainError::not_found(format!("batch {}", command.reference)))?;

    product.change_batch_quantity(&command.reference, command.qty)?;
    Ok(None)
}

pub fn send_out_of_stock_notification<N>(
    event: &OutOfStock,
    notifier: &N,
    recipient: &str,
) -> Result<(), HandlerError>
where
    N: Notifier + ?Sized,
{
    notifier.send(recipient, &format!("Out of stock for {}", event.sku))?;
    Ok(())
}

/// Broadcast the flat `{orderid, sku, qty, batchref}` mapping on `topic`.
pub fn publish_allocated_event<B>(
    event: &Allocated,
    bus: &B,
    topic: &str,
) -> Result<(), HandlerError>
where
    B: EventBus<JsonValue> + ?Sized,
{
    let payload = serde_json::to_value(event)?;
    bus.publish(topic, payload)
        .map_err(|err| HandlerError::External(anyhow::Error::new(err)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::notifications::InMemoryNotifier;
    use crate::repository::{InMemoryProductStore, InMemoryRepository};
    use allocation_core::{BatchRef, OrderId, Sku};
    use allocation_events::InMemoryEventBus;

    fn repository() -> InMemoryRepository {
        InMemoryRepository::new(Arc::new(InMemoryProductStore::new()))
    }

    fn create_batch(reference: &str, sku: &str, qty: u32) -> CreateBatch {
        CreateBatch {
            reference: BatchRef::new(reference),
            sku: Sku::new(sku),
            qty,
            eta: None,
        }
    }

    #[test]
    fn add_batch_creates_product_then_appends() {
        let mut repo = repository();
        add_batch(&create_batch("b1", "CRUNCHY-ARMCHAIR", 100), &mut repo).unwrap();
        add_batch(&create_batch("b2", "CRUNCHY-ARMCHAIR", 99), &mut repo).unwrap();

        let product = repo.get(&Sku::new("CRUNCHY-ARMCHAIR")).unwrap().unwrap();
        let refs: Vec<_> = product.batches().iter().map(|b| b.reference().clone()).collect();
        assert_eq!(refs, vec![BatchRef::new("b1"), BatchRef::new("b2")]);
    }

    #[test]
    fn add_batch_rejects_duplicate_reference() {
        let mut repo = repository();
        add_batch(&create_batch("b1", "LAMP", 10), &mut repo).unwrap();
        let err = add_batch(&create_batch("b1", "LAMP", 5), &mut repo).unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn add_batch_rejects_reference_owned_by_another_sku() {
        let mut repo = repository();
        add_batch(&create_batch("b1", "LAMP", 10), &mut repo).unwrap();

        let err = add_batch(&create_batch("b1", "SOFA", 5), &mut repo).unwrap_err();

        assert!(matches!(err, HandlerError::Domain(DomainError::Conflict(_))));
        assert!(err.to_string().contains("LAMP"));
        assert!(repo.get(&Sku::new("SOFA")).unwrap().is_none());
    }

    #[test]
    fn allocate_unknown_sku_is_invalid_sku() {
        let mut repo = repository();
        let err = allocate(
            &Allocate {
                order_id: OrderId::new("o1"),
                sku: Sku::new("NONEXISTENTSKU"),
                qty: 10,
            },
            &mut repo,
        )
        .unwrap_err();

        assert!(matches!(err, HandlerError::Domain(DomainError::InvalidSku(_))));
        assert_eq!(err.to_string(), "Invalid sku NONEXISTENTSKU");
    }

    #[test]
    fn change_quantity_of_unknown_batch_is_not_found() {
        let mut repo = repository();
        let err = change_batch_quantity(
            &ChangeBatchQuantity {
                reference: BatchRef::new("missing"),
                qty: 1,
            },
            &mut repo,
        )
        .unwrap_err();
        assert!(matches!(err, HandlerError::Domain(DomainError::NotFound(_))));
    }

    #[test]
    fn out_of_stock_notification_names_the_sku() {
        let notifier = InMemoryNotifier::new();
        send_out_of_stock_notification(
            &OutOfStock {
                sku: Sku::new("POPULAR-CURTAINS"),
            },
            &notifier,
            "stock@made.com",
        )
        .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent[0].recipient, "stock@made.com");
        assert_eq!(sent[0].message, "Out of stock for POPULAR-CURTAINS");
    }

    #[test]
    fn allocated_event_is_published_as_flat_json() {
        let bus = InMemoryEventBus::<JsonValue>::new();
        let subscription = bus.subscribe("line_allocated");

        publish_allocated_event(
            &Allocated {
                order_id: OrderId::new("o1"),
                sku: Sku::new("LAMP"),
                qty: 3,
                batch_ref: BatchRef::new("b1"),
            },
            &bus,
            "line_allocated",
        )
        .unwrap();

        assert_eq!(
            subscription.try_recv().unwrap(),
            json!({"orderid": "o1", "sku": "LAMP", "qty": 3, "batchref": "b1"})
        );
    }
}
