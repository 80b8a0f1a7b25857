//! Channel contracts.
//!
//! Channel adapters (chat rooms, web chat, relays, ...) plug into the hub by
//! implementing [`MessageReceiver`] to accept routed events and
//! [`MessageEmitter`] to announce the channel name they originate events
//! under.

use async_trait::async_trait;
use switchyard_core::{DeliveryResult, RoutableEvent};

/// Accepts events routed to a channel.
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// The channel name or glob this receiver is registered under,
    /// e.g. `aopriv(*)` or `relay(nady)`.
    fn channel_name(&self) -> String;

    /// Delivers `event` to `destination`, the concrete address taken from the
    /// route (the part inside `type(...)`, or the whole destination if it has
    /// none).
    ///
    /// Returns `Ok(false)` if the receiver chose not to deliver this event.
    async fn receive(&self, event: &RoutableEvent, destination: &str) -> DeliveryResult<bool>;
}

/// Declares a channel that events may originate from.
pub trait MessageEmitter: Send + Sync {
    fn channel_name(&self) -> String;
}

/// Keeps presence tracking in sync with routes that target a single
/// character.
///
/// Adding a route to `aotell(Name)` asks the watcher to track `Name`;
/// removing it releases that request again.
pub trait BuddyWatcher: Send + Sync {
    fn add(&self, character: &str, reason: &str);
    fn remove(&self, character: &str, reason: &str);
}

/// A watcher that ignores every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBuddyWatcher;

impl BuddyWatcher for NoBuddyWatcher {
    fn add(&self, _character: &str, _reason: &str) {}
    fn remove(&self, _character: &str, _reason: &str) {}
}

/// An emitter that only carries a name.
#[derive(Debug, Clone)]
pub struct NamedEmitter(pub String);

impl MessageEmitter for NamedEmitter {
    fn channel_name(&self) -> String {
        self.0.clone()
    }
}
