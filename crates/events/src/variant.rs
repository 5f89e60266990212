//! Typed access to one variant of a message sum type.

/// A concrete payload that is one variant of the message enum `M`.
///
/// Lets a handler registry be keyed by the variant tag while handlers still
/// receive the concrete payload type instead of the whole enum.
pub trait Variant<M>: Sized + 'static {
    /// Registry key; equal to the enum's `command_type()` / `event_type()` for
    /// this variant.
    const TYPE: &'static str;

    /// Borrow the payload if `message` is this variant.
    fn extract(message: &M) -> Option<&Self>;
}
