//! Allocation domain module.
//!
//! This crate contains the business rules for allocating order lines against
//! stock batches, implemented purely as deterministic domain logic (no IO, no
//! HTTP, no storage).

pub mod batch;
pub mod messages;
pub mod product;

pub use batch::{Batch, OrderLine};
pub use messages::{
    Allocate, AllocationCommand, AllocationEvent, AllocationMessage, Allocated,
    ChangeBatchQuantity, CreateBatch, OutOfStock,
};
pub use product::{Product, allocate};
