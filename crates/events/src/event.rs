/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - broadcast to zero or more independent handlers
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "allocation.allocated").
    ///
    /// Handler registries are keyed by this value, so it must be unique per
    /// variant.
    fn event_type(&self) -> &'static str;
}
