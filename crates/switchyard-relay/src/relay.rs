//! Live relays.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use switchyard_core::{DeliveryError, DeliveryResult, RelayConfig, RoutableEvent, Source, hop};
use switchyard_routing::{MessageEmitter, MessageHub, MessageReceiver};

use crate::component::{RelayProtocol, RelayTransport, StackLayer, TransportHandler};
use crate::error::RelayResult;

/// Connection state of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Uninitialized,
    Initializing,
    Connected,
    Disconnected,
    /// Torn down; the relay will not come back.
    Deinitialized,
}

impl RelayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Deinitialized => "deinitialized",
        }
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A running relay stack: one transport, any number of layers, one protocol.
///
/// A relay is both receiver and emitter of channel `relay(<name>)` in the
/// hub.
pub struct Relay {
    config: RelayConfig,
    transport: Arc<dyn RelayTransport>,
    layers: Vec<Arc<dyn StackLayer>>,
    protocol: Arc<dyn RelayProtocol>,
    status: RwLock<RelayStatus>,
    hub: Weak<MessageHub>,
    this: Weak<Relay>,
}

impl Relay {
    /// Assembles a relay. `layers` are ordered from the transport side to the
    /// protocol side.
    pub fn new(
        config: RelayConfig,
        transport: Arc<dyn RelayTransport>,
        layers: Vec<Arc<dyn StackLayer>>,
        protocol: Arc<dyn RelayProtocol>,
        hub: Weak<MessageHub>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            transport,
            layers,
            protocol,
            status: RwLock::new(RelayStatus::Uninitialized),
            hub,
            this: this.clone(),
        })
    }

    pub fn id(&self) -> i64 {
        self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The stored configuration this relay was built from.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// `relay(<name>)`
    pub fn channel(&self) -> String {
        format!("{}({})", hop::RELAY, self.config.name)
    }

    pub fn status(&self) -> RelayStatus {
        *self.status.read()
    }

    fn set_status(&self, status: RelayStatus) {
        let mut current = self.status.write();
        if *current == RelayStatus::Deinitialized || *current == status {
            return;
        }
        let from = *current;
        debug!(relay = %self.config.name, %from, to = %status, "Relay status changed");
        *current = status;
    }

    fn is_deinitialized(&self) -> bool {
        self.status() == RelayStatus::Deinitialized
    }

    /// Initializes the stack from the protocol outwards and connects.
    ///
    /// Stops early once the relay has been deinitialized; a transport that
    /// finishes connecting after that is torn down again.
    pub async fn init(&self) -> RelayResult<()> {
        self.set_status(RelayStatus::Initializing);
        let result = self.init_stack().await;
        match &result {
            Ok(()) if self.is_deinitialized() => {
                debug!(relay = %self.config.name, "Relay was torn down during init")
            }
            Ok(()) => info!(relay = %self.config.name, "Relay initialized"),
            Err(_) => self.set_status(RelayStatus::Disconnected),
        }
        result
    }

    async fn init_stack(&self) -> RelayResult<()> {
        if self.is_deinitialized() {
            return Ok(());
        }
        self.protocol.init().await?;
        for layer in self.layers.iter().rev() {
            if self.is_deinitialized() {
                return Ok(());
            }
            layer.init().await?;
        }
        let Some(this) = self.this.upgrade() else {
            return Ok(());
        };
        if self.is_deinitialized() {
            return Ok(());
        }
        self.transport.init(this).await?;
        if self.is_deinitialized()
            && let Err(e) = self.transport.deinit().await
        {
            warn!(relay = %self.config.name, error = %e, "Transport deinit failed");
        }
        Ok(())
    }

    /// Tears the stack down: protocol, layers in reverse, then transport.
    ///
    /// Errors are logged; every component gets its chance to clean up.
    pub async fn deinit(&self) {
        self.set_status(RelayStatus::Deinitialized);
        if let Err(e) = self.protocol.deinit().await {
            warn!(relay = %self.config.name, error = %e, "Protocol deinit failed");
        }
        for layer in self.layers.iter().rev() {
            if let Err(e) = layer.deinit().await {
                warn!(relay = %self.config.name, error = %e, "Layer deinit failed");
            }
        }
        if let Err(e) = self.transport.deinit().await {
            warn!(relay = %self.config.name, error = %e, "Transport deinit failed");
        }
        info!(relay = %self.config.name, "Relay destroyed");
    }

    /// Encodes `event` and sends it. Returns `false` if the protocol does not
    /// relay this kind of event.
    pub async fn send_event(&self, event: &RoutableEvent) -> RelayResult<bool> {
        let Some(mut frame) = self.protocol.encode(event)? else {
            return Ok(false);
        };
        for layer in self.layers.iter().rev() {
            frame = layer.encode(frame)?;
        }
        self.transport.send(frame).await?;
        Ok(true)
    }

    /// Decodes an inbound frame. The event gets this relay as its first hop.
    pub fn decode_frame(&self, frame: Vec<u8>) -> RelayResult<Option<RoutableEvent>> {
        let mut frame = frame;
        for layer in &self.layers {
            match layer.decode(frame)? {
                Some(next) => frame = next,
                None => return Ok(None),
            }
        }
        let Some(mut event) = self.protocol.decode(&frame)? else {
            return Ok(None);
        };
        event.prepend_hop(Source::new(hop::RELAY, &self.config.name));
        Ok(Some(event))
    }
}

#[async_trait]
impl TransportHandler for Relay {
    async fn on_frame(&self, frame: Vec<u8>) {
        let event = match self.decode_frame(frame) {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(e) => {
                warn!(relay = %self.config.name, error = %e, "Dropping undecodable frame");
                return;
            }
        };
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        let status = hub.handle(event).await;
        trace!(relay = %self.config.name, ?status, "Inbound event routed");
    }

    fn on_status(&self, status: RelayStatus) {
        self.set_status(status);
    }
}

#[async_trait]
impl MessageReceiver for Relay {
    fn channel_name(&self) -> String {
        self.channel()
    }

    async fn receive(&self, event: &RoutableEvent, _destination: &str) -> DeliveryResult<bool> {
        if self.status() != RelayStatus::Connected {
            debug!(relay = %self.config.name, status = %self.status(), "Relay not ready, dropping event");
            return Ok(false);
        }
        if event
            .first_hop()
            .is_some_and(|first| first.key() == self.channel().to_lowercase())
        {
            return Ok(false);
        }
        self.send_event(event)
            .await
            .map_err(|e| DeliveryError::receiver(self.channel(), e))
    }
}

impl MessageEmitter for Relay {
    fn channel_name(&self) -> String {
        self.channel()
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("name", &self.config.name)
            .field("layers", &self.layers.len())
            .field("status", &self.status())
            .finish()
    }
}
