//! Configuration loading and representation.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::retry::RetryPolicy;

pub const DEFAULT_STOCK_RECIPIENT: &str = "stock@made.com";
pub const DEFAULT_ALLOCATED_TOPIC: &str = "line_allocated";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationConfig {
    /// Who gets told about out-of-stock skus.
    pub stock_recipient: String,
    /// Topic `Allocated` events are broadcast on.
    pub allocated_topic: String,
    /// Policy applied to every event handler.
    pub retry: RetryPolicy,
    /// Redis endpoint for the pub/sub publisher, when one is used.
    pub redis_url: Option<String>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            stock_recipient: DEFAULT_STOCK_RECIPIENT.to_string(),
            allocated_topic: DEFAULT_ALLOCATED_TOPIC.to_string(),
            retry: RetryPolicy::default(),
            redis_url: None,
        }
    }
}

impl AllocationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let stock_recipient = match lookup("ALLOCATION_STOCK_RECIPIENT") {
            Some(value) => non_empty("ALLOCATION_STOCK_RECIPIENT", value)?,
            None => {
                warn!(
                    recipient = DEFAULT_STOCK_RECIPIENT,
                    "ALLOCATION_STOCK_RECIPIENT not set; using default"
                );
                defaults.stock_recipient
            }
        };

        let allocated_topic = match lookup("ALLOCATION_ALLOCATED_TOPIC") {
            Some(value) => non_empty("ALLOCATION_ALLOCATED_TOPIC", value)?,
            None => defaults.allocated_topic,
        };

        let max_attempts = number(&lookup, "ALLOCATION_RETRY_MAX_ATTEMPTS")?
            .map(|n| n.min(u64::from(u32::MAX)) as u32)
            .unwrap_or(defaults.retry.max_attempts);
        let base_delay = number(&lookup, "ALLOCATION_RETRY_BASE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.base_delay);
        let max_delay = number(&lookup, "ALLOCATION_RETRY_MAX_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.max_delay);

        let redis_url = lookup("REDIS_URL").filter(|url| !url.trim().is_empty());

        Ok(Self {
            stock_recipient,
            allocated_topic,
            retry: RetryPolicy::exponential(max_attempts, base_delay, max_delay),
            redis_url,
        })
    }
}

fn non_empty(key: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(key));
    }
    Ok(trimmed.to_string())
}

fn number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}
