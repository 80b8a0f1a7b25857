//! Built-in relay transports.

#[cfg(feature = "websocket")]
mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::{WebsocketConfig, WebsocketTransport};
