//! Infrastructure event bus implementations.
//!
//! The `EventBus` abstraction and its in-memory implementation live in
//! `allocation-events`. This module provides transport-backed publishers.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisBusError, RedisPubSubEventBus};

#[cfg(feature = "redis")]
use crate::config::AllocationConfig;

/// The Redis publisher named by `config.redis_url`; `None` when it is unset.
#[cfg(feature = "redis")]
pub fn publisher_from_config(
    config: &AllocationConfig,
) -> Option<Result<RedisPubSubEventBus, RedisBusError>> {
    config.redis_url.as_deref().map(RedisPubSubEventBus::new)
}
