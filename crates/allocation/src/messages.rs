use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use allocation_core::{BatchRef, OrderId, Sku};
use allocation_events::{Command, Event, Message, Variant};

/// Command: CreateBatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    #[serde(rename = "ref")]
    pub reference: BatchRef,
    pub sku: Sku,
    pub qty: u32,
    pub eta: Option<NaiveDate>,
}

/// Command: Allocate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocate {
    #[serde(rename = "orderid")]
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

/// Command: ChangeBatchQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantity {
    #[serde(rename = "ref")]
    pub reference: BatchRef,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationCommand {
    CreateBatch(CreateBatch),
    Allocate(Allocate),
    ChangeBatchQuantity(ChangeBatchQuantity),
}

impl AllocationCommand {
    pub const CREATE_BATCH: &'static str = "allocation.create_batch";
    pub const ALLOCATE: &'static str = "allocation.allocate";
    pub const CHANGE_BATCH_QUANTITY: &'static str = "allocation.change_batch_quantity";

    /// Every command type; each needs exactly one registered handler.
    pub const TYPES: [&'static str; 3] = [
        Self::CREATE_BATCH,
        Self::ALLOCATE,
        Self::CHANGE_BATCH_QUANTITY,
    ];
}

impl Command for AllocationCommand {
    fn command_type(&self) -> &'static str {
        match self {
            AllocationCommand::CreateBatch(_) => Self::CREATE_BATCH,
            AllocationCommand::Allocate(_) => Self::ALLOCATE,
            AllocationCommand::ChangeBatchQuantity(_) => Self::CHANGE_BATCH_QUANTITY,
        }
    }
}

/// Event: Allocated.
///
/// Serializes to the flat mapping external subscribers consume:
/// `{"orderid", "sku", "qty", "batchref"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    #[serde(rename = "orderid")]
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
    #[serde(rename = "batchref")]
    pub batch_ref: BatchRef,
}

/// Event: OutOfStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub sku: Sku,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationEvent {
    Allocated(Allocated),
    OutOfStock(OutOfStock),
}

impl AllocationEvent {
    pub const ALLOCATED: &'static str = "allocation.allocated";
    pub const OUT_OF_STOCK: &'static str = "allocation.out_of_stock";
}

impl Event for AllocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AllocationEvent::Allocated(_) => Self::ALLOCATED,
            AllocationEvent::OutOfStock(_) => Self::OUT_OF_STOCK,
        }
    }
}

/// Anything the allocation bus routes.
pub type AllocationMessage = Message<AllocationCommand, AllocationEvent>;

macro_rules! impl_into_message {
    ($variant:ident, $wrapper:ident, $side:ident, $tag:ident) => {
        impl Variant<$wrapper> for $variant {
            const TYPE: &'static str = $wrapper::$tag;

            fn extract(message: &$wrapper) -> Option<&Self> {
                match message {
                    $wrapper::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$variant> for $wrapper {
            fn from(value: $variant) -> Self {
                $wrapper::$variant(value)
            }
        }

        impl From<$variant> for AllocationMessage {
            fn from(value: $variant) -> Self {
                Message::$side($wrapper::$variant(value))
            }
        }
    };
}

impl_into_message!(CreateBatch, AllocationCommand, Command, CREATE_BATCH);
impl_into_message!(Allocate, AllocationCommand, Command, ALLOCATE);
impl_into_message!(ChangeBatchQuantity, AllocationCommand, Command, CHANGE_BATCH_QUANTITY);
impl_into_message!(Allocated, AllocationEvent, Event, ALLOCATED);
impl_into_message!(OutOfStock, AllocationEvent, Event, OUT_OF_STOCK);

impl From<AllocationCommand> for AllocationMessage {
    fn from(value: AllocationCommand) -> Self {
        Message::Command(value)
    }
}

impl From<AllocationEvent> for AllocationMessage {
    fn from(value: AllocationEvent) -> Self {
        Message::Event(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn allocated_serializes_to_flat_wire_mapping() {
        let event = Allocated {
            order_id: OrderId::new("o1"),
            sku: Sku::new("RED-CHAIR"),
            qty: 10,
            batch_ref: BatchRef::new("b1"),
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"orderid": "o1", "sku": "RED-CHAIR", "qty": 10, "batchref": "b1"})
        );
    }

    #[test]
    fn command_types_are_distinct() {
        let mut types = AllocationCommand::TYPES.to_vec();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), AllocationCommand::TYPES.len());
    }

    #[test]
    fn variant_tags_match_enum_types() {
        let cmd = AllocationCommand::from(Allocate {
            order_id: OrderId::new("o1"),
            sku: Sku::new("X"),
            qty: 1,
        });
        assert_eq!(<Allocate as Variant<AllocationCommand>>::TYPE, cmd.command_type());
        assert!(Allocate::extract(&cmd).is_some());
        assert!(CreateBatch::extract(&cmd).is_none());
    }

    #[test]
    fn variants_convert_into_messages() {
        let msg: AllocationMessage = OutOfStock { sku: Sku::new("X") }.into();
        assert_eq!(msg.message_type(), AllocationEvent::OUT_OF_STOCK);

        let msg: AllocationMessage = ChangeBatchQuantity {
            reference: BatchRef::new("b1"),
            qty: 5,
        }
        .into();
        assert_eq!(msg.message_type(), AllocationCommand::CHANGE_BATCH_QUANTITY);
    }
}
