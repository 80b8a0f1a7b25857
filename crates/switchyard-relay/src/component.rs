//! Relay stack contracts and component registries.
//!
//! A relay stack reads from the wire inwards:
//!
//! ```text
//! outbound: RoutableEvent ─▶ protocol.encode ─▶ layer N … layer 1 ─▶ transport.send
//! inbound:  transport ─▶ layer 1 … layer N ─▶ protocol.decode ─▶ MessageHub::handle
//! ```
//!
//! Built-in components contribute themselves to [`RELAY_TRANSPORTS`],
//! [`RELAY_LAYERS`] and [`RELAY_PROTOCOLS`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use switchyard_core::{Character, ClassSpec, Component, Registry, RoutableEvent, ValidationResult};

use crate::error::RelayResult;
use crate::relay::RelayStatus;

// =============================================================================
// Contracts
// =============================================================================

/// Receives what a transport reads from the wire.
#[async_trait]
pub trait TransportHandler: Send + Sync {
    /// A complete frame arrived.
    async fn on_frame(&self, frame: Vec<u8>);

    /// The connection state changed.
    fn on_status(&self, status: RelayStatus);
}

/// Moves raw frames between bots.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Connects and starts delivering frames to `handler`.
    ///
    /// Reconnects after a lost connection are the transport's own business;
    /// it reports them through [`TransportHandler::on_status`].
    async fn init(&self, handler: Arc<dyn TransportHandler>) -> RelayResult<()>;

    async fn send(&self, frame: Vec<u8>) -> RelayResult<()>;

    async fn deinit(&self) -> RelayResult<()>;
}

/// Transforms frames between the protocol and the transport.
#[async_trait]
pub trait StackLayer: Send + Sync {
    async fn init(&self) -> RelayResult<()> {
        Ok(())
    }

    /// Protocol side to transport side.
    fn encode(&self, frame: Vec<u8>) -> RelayResult<Vec<u8>>;

    /// Transport side to protocol side. `None` swallows the frame.
    fn decode(&self, frame: Vec<u8>) -> RelayResult<Option<Vec<u8>>>;

    async fn deinit(&self) -> RelayResult<()> {
        Ok(())
    }
}

/// Encodes routed events for the wire and decodes them again.
#[async_trait]
pub trait RelayProtocol: Send + Sync {
    async fn init(&self) -> RelayResult<()> {
        Ok(())
    }

    /// `None` means this protocol does not relay the event.
    fn encode(&self, event: &RoutableEvent) -> RelayResult<Option<Vec<u8>>>;

    /// `None` means the frame carries nothing to route.
    fn decode(&self, frame: &[u8]) -> RelayResult<Option<RoutableEvent>>;

    async fn deinit(&self) -> RelayResult<()> {
        Ok(())
    }
}

/// The bot's own identity, made available to component factories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity(pub Character);

// =============================================================================
// Registries
// =============================================================================

#[distributed_slice]
pub static RELAY_TRANSPORTS: [fn() -> Component<dyn RelayTransport>];

#[distributed_slice]
pub static RELAY_LAYERS: [fn() -> Component<dyn StackLayer>];

#[distributed_slice]
pub static RELAY_PROTOCOLS: [fn() -> Component<dyn RelayProtocol>];

/// Position of a component in a relay stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Transport,
    Layer,
    Protocol,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 3] = [Self::Transport, Self::Layer, Self::Protocol];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Layer => "layer",
            Self::Protocol => "protocol",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three registries a relay stack is assembled from.
pub struct RelayComponents {
    pub transports: Registry<dyn RelayTransport>,
    pub layers: Registry<dyn StackLayer>,
    pub protocols: Registry<dyn RelayProtocol>,
}

impl Default for RelayComponents {
    fn default() -> Self {
        Self::empty()
    }
}

impl RelayComponents {
    /// Registries without any components.
    pub fn empty() -> Self {
        Self {
            transports: Registry::new(ComponentKind::Transport.as_str()),
            layers: Registry::new(ComponentKind::Layer.as_str()),
            protocols: Registry::new(ComponentKind::Protocol.as_str()),
        }
    }

    /// Every built-in component linked into the binary.
    pub fn collect() -> Self {
        Self {
            transports: Registry::from_slice(ComponentKind::Transport.as_str(), &RELAY_TRANSPORTS),
            layers: Registry::from_slice(ComponentKind::Layer.as_str(), &RELAY_LAYERS),
            protocols: Registry::from_slice(ComponentKind::Protocol.as_str(), &RELAY_PROTOCOLS),
        }
    }

    pub fn register_transport(
        &mut self,
        component: Component<dyn RelayTransport>,
    ) -> ValidationResult<()> {
        self.transports.register(component)
    }

    pub fn register_layer(&mut self, component: Component<dyn StackLayer>) -> ValidationResult<()> {
        self.layers.register(component)
    }

    pub fn register_protocol(
        &mut self,
        component: Component<dyn RelayProtocol>,
    ) -> ValidationResult<()> {
        self.protocols.register(component)
    }

    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        match kind {
            ComponentKind::Transport => self.transports.contains(name),
            ComponentKind::Layer => self.layers.contains(name),
            ComponentKind::Protocol => self.protocols.contains(name),
        }
    }

    pub fn spec(&self, kind: ComponentKind, name: &str) -> Option<&ClassSpec> {
        match kind {
            ComponentKind::Transport => self.transports.get(name).map(|c| &c.spec),
            ComponentKind::Layer => self.layers.get(name).map(|c| &c.spec),
            ComponentKind::Protocol => self.protocols.get(name).map(|c| &c.spec),
        }
    }

    /// Specs of one kind, sorted by name.
    pub fn specs(&self, kind: ComponentKind) -> Vec<&ClassSpec> {
        match kind {
            ComponentKind::Transport => self.transports.specs().collect(),
            ComponentKind::Layer => self.layers.specs().collect(),
            ComponentKind::Protocol => self.protocols.specs().collect(),
        }
    }
}

impl fmt::Debug for RelayComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayComponents")
            .field("transports", &self.transports.len())
            .field("layers", &self.layers.len())
            .field("protocols", &self.protocols.len())
            .finish()
    }
}
