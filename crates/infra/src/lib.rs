//! Infrastructure layer: storage, unit of work, message bus, wiring.

pub mod bootstrap;
pub mod config;
pub mod event_bus;
pub mod handlers;
pub mod message_bus;
pub mod notifications;
pub mod repository;
pub mod retry;
pub mod unit_of_work;

pub use bootstrap::bootstrap;
#[cfg(feature = "redis")]
pub use bootstrap::{RedisBootstrapError, bootstrap_with_redis};
pub use config::{AllocationConfig, ConfigError};
pub use message_bus::{BusError, CommandResult, HandlerError, MessageBus, MessageBusBuilder};
pub use notifications::{InMemoryNotifier, Notifier, SentNotification, TracingNotifier};
pub use repository::{InMemoryProductStore, InMemoryRepository, ProductRepository, StorageError};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use unit_of_work::{
    InMemoryUnitOfWork, InMemoryUnitOfWorkFactory, UnitOfWork, UnitOfWorkFactory, UnitOfWorkState,
    run_in_unit_of_work,
};
