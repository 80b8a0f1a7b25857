//! # Switchyard
//!
//! Message routing and bot-to-bot relaying for chat bots.
//!
//! ## Overview
//!
//! Every place a message can come from or go to is a named channel in the
//! [`MessageHub`](routing::MessageHub). Routes connect channels, optionally
//! filtered and rewritten by event modifiers. Relays link the hub to other
//! bots over a stack of transport, layers and protocol.
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────────────────────────┐
//! │ aoorg        │────▶│             │────▶│ relay(nady)                      │
//! │ (receiver)   │     │ MessageHub  │     │ nadynative ▶ aes-gcm ▶ websocket │──▶ other bots
//! │ discord(#x)  │◀────│   routes    │◀────│                                  │◀──
//! └──────────────┘     └─────────────┘     └──────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SwitchyardRuntime::builder().build().await?;
//!     runtime.start().await?;
//!
//!     runtime
//!         .relays()
//!         .create_relay("nady", r#"websocket(server="wss://ws.nadybot.org") nadynative()"#)
//!         .await?;
//!     runtime.routes().add_route_expression("aoorg", "relay(nady)", true, "").await?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `websocket` (default): the `websocket` relay transport
//! - `encryption` (default): the `aes-gcm-encryption` relay layer

pub use switchyard_core as core;
pub use switchyard_relay as relay;
pub use switchyard_routing as routing;
pub use switchyard_runtime as runtime;
pub use switchyard_storage as storage;

/// Commonly used types for hosting a Switchyard instance.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    pub use switchyard_core::prelude::*;
    pub use switchyard_relay::{
        BotIdentity, Relay, RelayController, RelayError, RelayProtocol, RelayStatus,
        RelayTransport, StackLayer, TransportHandler,
    };
    pub use switchyard_routing::{
        DeliveryStatus, EventModifier, MessageEmitter, MessageHub, MessageReceiver, MessageRoute,
        RouteController, RouteError,
    };
    pub use switchyard_runtime::{RuntimeError, SwitchyardConfig, SwitchyardRuntime};

    pub use switchyard_runtime::prelude::*;

    pub use async_trait::async_trait;
}

// Channels and relay components are written with it
pub use async_trait::async_trait;
