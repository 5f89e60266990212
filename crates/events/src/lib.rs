//! Message mechanics: commands, events, and the outbound pub/sub contract.
//!
//! Nothing in here knows about stock allocation; the domain crate supplies the
//! concrete message types.

pub mod bus;
pub mod command;
pub mod event;
pub mod in_memory_bus;
pub mod message;
pub mod variant;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use message::Message;
pub use variant::Variant;
