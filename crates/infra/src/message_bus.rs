//! In-process message bus.
//!
//! `MessageBus::handle` drains a FIFO queue seeded with one message:
//!
//! ```text
//! Command ──> exactly one handler, inside a unit of work
//!               ├─ Err  -> logged, returned to the caller (queue abandoned)
//!               └─ Ok   -> result recorded, harvested messages appended
//! Event   ──> every subscribed handler, each in its own unit of work,
//!             retried per `RetryPolicy`; exhaustion is logged and swallowed
//! ```
//!
//! Handler tables are built once by `MessageBusBuilder` and are read-only
//! afterwards, so a bus can be shared across threads. Every call to `handle`
//! runs on the caller's thread.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use thiserror::Error;
use tracing::{Span, debug, error, instrument};
use uuid::Uuid;

use allocation_core::{BatchRef, DomainError};
use allocation_domain::{AllocationCommand, AllocationEvent, AllocationMessage};
use allocation_events::{Command, Event, Message, Variant};

use crate::repository::{ProductRepository, StorageError};
use crate::retry::RetryPolicy;
use crate::unit_of_work::{UnitOfWorkFactory, run_in_unit_of_work};

/// What a command handler hands back to the caller.
pub type CommandResult = Option<BatchRef>;

type CommandHandlerFn = Box<
    dyn Fn(&AllocationCommand, &mut dyn ProductRepository) -> Result<CommandResult, HandlerError>
        + Send
        + Sync,
>;

type EventHandlerFn = Box<
    dyn Fn(&AllocationEvent, &mut dyn ProductRepository) -> Result<(), HandlerError> + Send + Sync,
>;

struct NamedEventHandler {
    name: String,
    handler: EventHandlerFn,
}

/// Failure inside a single handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Notification/publishing collaborators.
    #[error("external call failed: {0}")]
    External(#[from] anyhow::Error),

    /// The handler was routed a message of another type.
    #[error("handler expected a {0} message")]
    Unroutable(&'static str),
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("no handler registered for command {0}")]
    NoHandler(&'static str),

    #[error("a handler is already registered for command {0}")]
    DuplicateHandler(&'static str),

    #[error("commands without a handler: {0:?}")]
    MissingHandlers(Vec<&'static str>),

    #[error("handling {message} failed: {source}")]
    Handler {
        message: &'static str,
        #[source]
        source: HandlerError,
    },
}

impl BusError {
    /// The domain rule a command broke, for mapping onto user-facing errors.
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            BusError::Handler {
                source: HandlerError::Domain(err),
                ..
            } => Some(err),
            _ => None,
        }
    }

    /// True when the command lost an optimistic concurrency race and can be
    /// retried as-is.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            BusError::Handler {
                source: HandlerError::Storage(StorageError::Concurrency(_)),
                ..
            }
        )
    }
}

#[derive(Default)]
pub struct MessageBusBuilder {
    commands: HashMap<&'static str, CommandHandlerFn>,
    events: HashMap<&'static str, Vec<NamedEventHandler>>,
    retry_policy: RetryPolicy,
}

impl MessageBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single handler for command variant `V`.
    pub fn command<V, H>(mut self, handler: H) -> Result<Self, BusError>
    where
        V: Variant<AllocationCommand>,
        H: Fn(&V, &mut dyn ProductRepository) -> Result<CommandResult, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        if self.commands.contains_key(V::TYPE) {
            return Err(BusError::DuplicateHandler(V::TYPE));
        }
        let boxed: CommandHandlerFn = Box::new(
            move |command: &AllocationCommand, repository: &mut dyn ProductRepository| {
                let command = V::extract(command).ok_or(HandlerError::Unroutable(V::TYPE))?;
                handler(command, repository)
            },
        );
        self.commands.insert(V::TYPE, boxed);
        Ok(self)
    }

    /// Subscribe a named handler to event variant `V`. Handlers run in
    /// registration order.
    pub fn event<V, H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        V: Variant<AllocationEvent>,
        H: Fn(&V, &mut dyn ProductRepository) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let boxed: EventHandlerFn = Box::new(
            move |event: &AllocationEvent, repository: &mut dyn ProductRepository| {
                let event = V::extract(event).ok_or(HandlerError::Unroutable(V::TYPE))?;
                handler(event, repository)
            },
        );
        self.events.entry(V::TYPE).or_default().push(NamedEventHandler {
            name: name.into(),
            handler: boxed,
        });
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Fails unless every command type has a handler.
    pub fn build(self) -> Result<MessageBus, BusError> {
        let missing: Vec<&'static str> = AllocationCommand::TYPES
            .into_iter()
            .filter(|command_type| !self.commands.contains_key(command_type))
            .collect();
        if !missing.is_empty() {
            return Err(BusError::MissingHandlers(missing));
        }

        Ok(MessageBus {
            commands: self.commands,
            events: self.events,
            retry_policy: self.retry_policy,
        })
    }
}

pub struct MessageBus {
    commands: HashMap<&'static str, CommandHandlerFn>,
    events: HashMap<&'static str, Vec<NamedEventHandler>>,
    retry_policy: RetryPolicy,
}

impl MessageBus {
    pub fn builder() -> MessageBusBuilder {
        MessageBusBuilder::new()
    }

    /// Process `message` and everything it causes, in FIFO order.
    ///
    /// Returns one entry per command executed, in execution order. The first
    /// failing command aborts processing; anything still queued is dropped.
    #[instrument(
        skip_all,
        fields(correlation_id = %Uuid::now_v7(), message = tracing::field::Empty)
    )]
    pub fn handle<F>(
        &self,
        message: impl Into<AllocationMessage>,
        uow_factory: &F,
    ) -> Result<Vec<CommandResult>, BusError>
    where
        F: UnitOfWorkFactory,
    {
        let message = message.into();
        Span::current().record("message", message.message_type());

        let mut queue = VecDeque::from([message]);
        let mut results = Vec::new();

        while let Some(message) = queue.pop_front() {
            debug!(
                message_type = message.message_type(),
                queued = queue.len(),
                "dispatching message"
            );
            match message {
                Message::Command(command) => {
                    let (result, produced) = self.handle_command(&command, uow_factory)?;
                    results.push(result);
                    queue.extend(produced);
                }
                Message::Event(event) => self.handle_event(&event, uow_factory, &mut queue),
            }
        }

        Ok(results)
    }

    fn handle_command<F>(
        &self,
        command: &AllocationCommand,
        uow_factory: &F,
    ) -> Result<(CommandResult, Vec<AllocationMessage>), BusError>
    where
        F: UnitOfWorkFactory,
    {
        let command_type = command.command_type();
        let handler = self
            .commands
            .get(command_type)
            .ok_or(BusError::NoHandler(command_type))?;

        run_in_unit_of_work(uow_factory, |repository| handler(command, repository)).map_err(
            |source| {
                error!(command = command_type, error = %source, "exception handling command");
                BusError::Handler {
                    message: command_type,
                    source,
                }
            },
        )
    }

    fn handle_event<F>(
        &self,
        event: &AllocationEvent,
        uow_factory: &F,
        queue: &mut VecDeque<AllocationMessage>,
    ) where
        F: UnitOfWorkFactory,
    {
        let event_type = event.event_type();
        let Some(handlers) = self.events.get(event_type) else {
            debug!(event = event_type, "no subscribers");
            return;
        };

        for NamedEventHandler { name, handler } in handlers {
            let outcome = self.retry_policy.run(|attempt| {
                debug!(event = event_type, handler = %name, attempt, "handling event");
                run_in_unit_of_work(uow_factory, |repository| handler(event, repository))
            });
            match outcome {
                Ok(((), produced)) => queue.extend(produced),
                Err(err) => error!(
                    event = event_type,
                    handler = %name,
                    error = %err,
                    "event handler failed after retries; dropping"
                ),
            }
        }
    }
}

fn subscriber_names<'a>(
    events: &'a HashMap<&'static str, Vec<NamedEventHandler>>,
) -> HashMap<&'static str, Vec<&'a str>> {
    events
        .iter()
        .map(|(event_type, handlers)| {
            (*event_type, handlers.iter().map(|h| h.name.as_str()).collect())
        })
        .collect()
}

impl fmt::Debug for MessageBusBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBusBuilder")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("events", &subscriber_names(&self.events))
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("events", &subscriber_names(&self.events))
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}
