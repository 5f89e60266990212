//! The sum type a message bus routes on.

use crate::{Command, Event};

/// A message travelling through the bus: either a command or an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<C, E> {
    Command(C),
    Event(E),
}

impl<C, E> Message<C, E>
where
    C: Command,
    E: Event,
{
    /// The registry key of the wrapped command or event.
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Command(c) => c.command_type(),
            Message::Event(e) => e.event_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping;

    impl Command for Ping {
        fn command_type(&self) -> &'static str {
            "test.ping"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Pinged;

    impl Event for Pinged {
        fn event_type(&self) -> &'static str {
            "test.pinged"
        }
    }

    #[test]
    fn routes_on_wrapped_type() {
        let cmd: Message<Ping, Pinged> = Message::Command(Ping);
        assert_eq!(cmd.message_type(), "test.ping");

        let ev: Message<Ping, Pinged> = Message::Event(Pinged);
        assert_eq!(ev.message_type(), "test.pinged");
    }
}
