//! Event modifiers.
//!
//! A modifier is attached to a route and sees every event travelling along
//! it. It can pass the event on unchanged, hand back a transformed copy, or
//! drop it for that route only.

use linkme::distributed_slice;
use switchyard_core::{Component, DeliveryResult, Registry, RoutableEvent};

/// Transform-or-drop operation applied to routed events.
pub trait EventModifier: Send + Sync {
    /// Returns the (possibly transformed) event, or `None` to drop it.
    fn modify(&self, event: &RoutableEvent) -> DeliveryResult<Option<RoutableEvent>>;
}

/// Built-in modifiers contributed by this and other crates.
#[distributed_slice]
pub static EVENT_MODIFIERS: [fn() -> Component<dyn EventModifier>];

/// Registry kind label used in messages.
pub const MODIFIER_KIND: &str = "modifier";

/// Collects every modifier registered through [`EVENT_MODIFIERS`].
pub fn collect_modifiers() -> Registry<dyn EventModifier> {
    Registry::from_slice(MODIFIER_KIND, &EVENT_MODIFIERS)
}
