//! Wiring: the one place handlers meet their collaborators.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use allocation_domain::{Allocate, Allocated, ChangeBatchQuantity, CreateBatch, OutOfStock};
use allocation_events::EventBus;

use crate::config::AllocationConfig;
use crate::handlers;
use crate::message_bus::{BusError, MessageBus};
use crate::notifications::Notifier;

#[cfg(feature = "redis")]
use crate::event_bus::{RedisBusError, publisher_from_config};

/// Build the allocation message bus.
///
/// Registers the three command handlers, notifies `config.stock_recipient`
/// on `OutOfStock`, and broadcasts `Allocated` on `config.allocated_topic`.
pub fn bootstrap<N, B>(
    config: &AllocationConfig,
    notifier: Arc<N>,
    publisher: B,
) -> Result<MessageBus, BusError>
where
    N: Notifier + ?Sized + 'static,
    B: EventBus<JsonValue> + 'static,
{
    let recipient = config.stock_recipient.clone();
    let topic = config.allocated_topic.clone();

    let bus = MessageBus::builder()
        .retry_policy(config.retry.clone())
        .command::<CreateBatch, _>(handlers::add_batch)?
        .command::<Allocate, _>(handlers::allocate)?
        .command::<ChangeBatchQuantity, _>(handlers::change_batch_quantity)?
        .event::<OutOfStock, _>("send_out_of_stock_notification", move |event, _| {
            handlers::send_out_of_stock_notification(event, notifier.as_ref(), &recipient)
        })
        .event::<Allocated, _>("publish_allocated_event", move |event, _| {
            handlers::publish_allocated_event(event, &publisher, &topic)
        })
        .build()?;

    info!(
        topic = %config.allocated_topic,
        max_attempts = config.retry.max_attempts,
        "message bus ready"
    );
    Ok(bus)
}

#[cfg(feature = "redis")]
#[derive(Debug, thiserror::Error)]
pub enum RedisBootstrapError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Redis(#[from] RedisBusError),
}

/// Build the bus with `Allocated` broadcast over Redis pub/sub.
///
/// `Ok(None)` when `config.redis_url` is unset; callers then pass their own
/// publisher to `bootstrap`.
#[cfg(feature = "redis")]
pub fn bootstrap_with_redis<N>(
    config: &AllocationConfig,
    notifier: Arc<N>,
) -> Result<Option<MessageBus>, RedisBootstrapError>
where
    N: Notifier + ?Sized + 'static,
{
    let Some(publisher) = publisher_from_config(config).transpose()? else {
        return Ok(None);
    };
    info!("publishing allocations over redis pub/sub");
    Ok(Some(bootstrap(config, notifier, publisher)?))
}
