//! Redis pub/sub-backed event bus (optional).
//!
//! Each topic maps to a Redis channel of the same name; payloads travel as
//! JSON strings. Redis pub/sub is not durable: subscribers that are offline
//! miss messages.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use allocation_events::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum RedisBusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Redis pub/sub bus for JSON payloads.
#[derive(Debug, Clone)]
pub struct RedisPubSubEventBus {
    client: redis::Client,
}

impl RedisPubSubEventBus {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref())?;
        Ok(Self { client })
    }
}

impl EventBus<JsonValue> for RedisPubSubEventBus {
    type Error = RedisBusError;

    #[instrument(skip(self, message), err)]
    fn publish(&self, topic: &str, message: JsonValue) -> Result<(), Self::Error> {
        let payload = serde_json::to_string(&message)?;
        let mut conn = self.client.get_connection()?;
        let receivers: i64 = conn.publish(topic, payload)?;
        debug!(receivers, "published to redis channel");
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Subscription<JsonValue> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = topic.to_string();

        // Background thread that receives pub/sub messages and forwards them.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(err) => {
                    warn!(error = %err, channel = %channel, "redis subscription could not connect");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(err) = pubsub.subscribe(&channel) {
                warn!(error = %err, channel = %channel, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let value: JsonValue = match serde_json::from_str(&payload) {
                    Ok(v) => v,
                    Err(err) => {
                        warn!(error = %err, channel = %channel, "dropping non-JSON payload");
                        continue;
                    }
                };

                if tx.send(value).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}
