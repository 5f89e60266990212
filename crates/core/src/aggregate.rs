//! Aggregate root traits for outbox-carrying domain models.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
///
/// Aggregates are the consistency boundary: repositories load and save them as
/// a whole, and external code never reaches into their children directly.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Persistence layers compare this on commit to detect concurrent writers.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// An aggregate that records the messages its methods produce.
///
/// Domain methods push into the outbox as a side effect; the unit of work
/// drains it after a successful commit. The aggregate is the only writer.
pub trait Outbox: AggregateRoot {
    type Message: Clone + core::fmt::Debug;

    /// Messages produced since the last drain, oldest first.
    fn pending_messages(&self) -> &[Self::Message];

    /// Remove and return all pending messages in FIFO order.
    fn take_messages(&mut self) -> Vec<Self::Message>;
}
