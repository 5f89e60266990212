//! Outbound notifications (email, chat, ...).

use std::sync::Mutex;

use anyhow::anyhow;
use tracing::info;

/// Delivery channel for human-facing notifications.
pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &str, message: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
        info!(recipient, message, "notification");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub message: String,
}

/// Records every notification; for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Notifier for InMemoryNotifier {
    fn send(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow!("notifier lock poisoned"))?
            .push(SentNotification {
                recipient: recipient.to_string(),
                message: message.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_notifier_records_in_order() {
        let notifier = InMemoryNotifier::new();
        notifier.send("a@example.com", "first").unwrap();
        notifier.send("b@example.com", "second").unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipient, "a@example.com");
        assert_eq!(sent[1].message, "second");
    }
}
