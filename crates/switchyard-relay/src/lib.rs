//! # Switchyard Relay
//!
//! Links this bot's message hub to other bots.
//!
//! A relay is a stack of one transport, any number of layers and one
//! protocol, written as an expression:
//!
//! ```text
//! websocket(server="wss://ws.nadybot.org") aes-gcm-encryption(password="x") nadynative()
//! ```
//!
//! [`RelayController`] parses such expressions, stores them and keeps the
//! resulting [`Relay`]s registered in the hub under `relay(<name>)`.
//!
//! ## Feature flags
//!
//! | Feature      | Component                      |
//! |--------------|--------------------------------|
//! | `websocket`  | `websocket` transport          |
//! | `encryption` | `aes-gcm-encryption` layer     |
//!
//! The `nadynative` protocol is always available.

pub mod catalog;
pub mod component;
pub mod controller;
pub mod error;
pub mod layers;
pub mod protocols;
pub mod relay;
pub mod transports;

pub use catalog::RelayOverview;
pub use component::{
    BotIdentity, ComponentKind, RELAY_LAYERS, RELAY_PROTOCOLS, RELAY_TRANSPORTS, RelayComponents,
    RelayProtocol, RelayTransport, StackLayer, TransportHandler,
};
pub use controller::{RelayController, RelaySettings};
pub use error::{MAX_RELAY_NAME_LENGTH, RelayError, RelayResult};
pub use relay::{Relay, RelayStatus};
