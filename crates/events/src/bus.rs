//! Outbound publish/subscribe abstraction (mechanics only).
//!
//! This is the **broadcast** side of the system: after a unit of work commits,
//! selected events are published on a named topic for consumers outside the
//! process (other services, dashboards, audit sinks).
//!
//! ## Delivery Guarantees
//!
//! - **At-least-once**: publishers are retried by the message bus, so a
//!   consumer may see the same payload twice and must be idempotent.
//! - **No persistence**: the bus is for distribution, not storage.
//! - **Topic-scoped broadcast**: every subscriber of a topic gets a copy of each
//!   message published on that topic.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to one topic.
///
/// Subscriptions are designed for single-threaded consumption:
///
/// ```ignore
/// let subscription = bus.subscribe("line_allocated");
/// loop {
///     match subscription.recv_timeout(Duration::from_secs(1)) {
///         Ok(payload) => process(payload)?,
///         Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
///         Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic topic pub/sub.
///
/// `publish()` can fail (network error, closed bus). Failures are surfaced to
/// the caller, which for event handlers is the message bus retry policy.
pub trait EventBus<M>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn publish(&self, topic: &str, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self, topic: &str) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, topic: &str, message: M) -> Result<(), Self::Error> {
        (**self).publish(topic, message)
    }

    fn subscribe(&self, topic: &str) -> Subscription<M> {
        (**self).subscribe(topic)
    }
}
