//! # Switchyard Routing
//!
//! The message hub and everything that travels through it.
//!
//! - [`MessageHub`] holds receivers, emitters, routes and hop styles and
//!   dispatches events with [`MessageHub::handle`].
//! - [`MessageRoute`] is one routing rule with its modifier chain.
//! - [`EventModifier`] implementations filter or rewrite events per route;
//!   the built-ins live in [`modifiers`].
//! - [`RouteController`] persists routes and hop styles.

pub mod channel;
pub mod controller;
pub mod error;
pub mod hub;
pub mod modifier;
pub mod modifiers;
pub mod route;
pub mod styles;

pub use channel::{BuddyWatcher, MessageEmitter, MessageReceiver, NamedEmitter, NoBuddyWatcher};
pub use controller::RouteController;
pub use error::{RouteError, RouteResult};
pub use hub::{DEFAULT_SYSTEM_COLOR, DeliveryStatus, HubSettings, MessageHub};
pub use modifier::{EVENT_MODIFIERS, EventModifier, MODIFIER_KIND, collect_modifiers};
pub use route::{ConfiguredModifier, MessageRoute};
pub use styles::{ColorField, HopColors};
