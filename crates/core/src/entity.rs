//! Entities: things with a lifecycle, compared by identifier.

/// Two entities with the same identifier are the same entity, whatever their
/// current mutable state.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Identity comparison, for `PartialEq` impls.
    fn same_identity_as(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
