/// An instruction with exactly one authoritative handler (command abstraction).
///
/// Commands represent **intent** - a request to change state. They are
/// transient (not persisted) and may be rejected by their handler.
///
/// ## Command vs Event
///
/// - **Command**: Intent to do something (e.g., "Allocate order line o1")
/// - **Event**: Fact that something happened (e.g., "Allocated o1 to batch b1")
///
/// A command failure is surfaced to whoever sent it; an event handler failure
/// is not.
///
/// ## Design Constraints
///
/// Commands must be cloneable (retries, logging), `Send + Sync` (they cross
/// thread boundaries between concurrent callers) and `'static`.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable command name/type identifier (e.g. "allocation.allocate").
    ///
    /// Handler registries are keyed by this value.
    fn command_type(&self) -> &'static str;
}
