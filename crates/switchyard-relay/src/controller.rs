//! Relay lifecycle management.
//!
//! [`RelayController`] turns layer expressions into running relays and keeps
//! three places in agreement: the database, its own registry of live relays
//! and the hub's receivers and emitters.
//!
//! # Creating a relay
//!
//! 1. Name checks: length, then uniqueness against live and stored relays.
//! 2. Stack checks: at least two layers, transport first, protocol last,
//!    every name known. Nothing is written before these pass.
//! 3. Inside one transaction: store the rows, build the live stack, register
//!    it, commit. Any failure rolls back and unregisters again.
//! 4. Connecting happens in the background; failures are only logged.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use switchyard_core::{
    Component, RelayConfig, RelayLayer, Registry, ServiceMap, ValidationResult, expression,
};
use switchyard_routing::MessageHub;
use switchyard_storage::{
    Storage, StorageResult, StorageTransaction, commit, relay as relay_store, rollback,
};

use crate::catalog::{self, RelayOverview, kind_at, render_layer};
use crate::component::{
    ComponentKind, RelayComponents, RelayProtocol, RelayTransport, StackLayer,
};
use crate::error::{MAX_RELAY_NAME_LENGTH, RelayError, RelayResult};
use crate::relay::Relay;

/// Behavior switches for [`RelayController`].
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Accept stacks written protocol first and flip them around.
    pub allow_reversed_stacks: bool,
    /// Longest accepted relay name, at most [`MAX_RELAY_NAME_LENGTH`].
    pub max_name_length: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            allow_reversed_stacks: false,
            max_name_length: MAX_RELAY_NAME_LENGTH,
        }
    }
}

/// Creates, loads, describes and deletes relays.
pub struct RelayController {
    hub: Arc<MessageHub>,
    storage: Storage,
    components: RwLock<RelayComponents>,
    services: ServiceMap,
    relays: RwLock<BTreeMap<String, Arc<Relay>>>,
    settings: RelaySettings,
}

impl RelayController {
    /// A controller using every built-in component.
    pub fn new(hub: Arc<MessageHub>, storage: Storage) -> Self {
        Self {
            hub,
            storage,
            components: RwLock::new(RelayComponents::collect()),
            services: ServiceMap::new(),
            relays: RwLock::new(BTreeMap::new()),
            settings: RelaySettings::default(),
        }
    }

    pub fn with_components(mut self, components: RelayComponents) -> Self {
        self.components = RwLock::new(components);
        self
    }

    /// Services handed to component factories.
    pub fn with_services(mut self, services: ServiceMap) -> Self {
        self.services = services;
        self
    }

    pub fn with_settings(mut self, settings: RelaySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn hub(&self) -> &Arc<MessageHub> {
        &self.hub
    }

    // -------------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------------

    pub fn register_transport(
        &self,
        component: Component<dyn RelayTransport>,
    ) -> ValidationResult<()> {
        self.components.write().register_transport(component)
    }

    pub fn register_layer(&self, component: Component<dyn StackLayer>) -> ValidationResult<()> {
        self.components.write().register_layer(component)
    }

    pub fn register_protocol(
        &self,
        component: Component<dyn RelayProtocol>,
    ) -> ValidationResult<()> {
        self.components.write().register_protocol(component)
    }

    /// All components of `kind`, with descriptions.
    pub fn component_overview(&self, kind: ComponentKind) -> String {
        let components = self.components.read();
        catalog::render_overview(kind, &components.specs(kind))
    }

    /// Parameters of one component, or `None` if it does not exist.
    pub fn component_details(&self, kind: ComponentKind, name: &str) -> Option<String> {
        let components = self.components.read();
        components.spec(kind, name).map(catalog::render_details)
    }

    // -------------------------------------------------------------------------
    // Live relays
    // -------------------------------------------------------------------------

    pub fn relay(&self, id: i64) -> Option<Arc<Relay>> {
        self.relays.read().values().find(|r| r.id() == id).cloned()
    }

    pub fn relay_by_name(&self, name: &str) -> Option<Arc<Relay>> {
        self.relays.read().get(&name.to_lowercase()).cloned()
    }

    pub fn relays(&self) -> Vec<Arc<Relay>> {
        self.relays.read().values().cloned().collect()
    }

    /// Registers a live relay here and in the hub. Returns `false` if the
    /// name is taken.
    fn add_relay(&self, relay: &Arc<Relay>) -> bool {
        let key = relay.name().to_lowercase();
        {
            let mut relays = self.relays.write();
            if relays.contains_key(&key) {
                return false;
            }
            relays.insert(key, Arc::clone(relay));
        }
        self.hub.register_receiver(Arc::clone(relay) as _);
        self.hub.register_emitter(Arc::clone(relay) as _);
        true
    }

    fn remove_relay(&self, name: &str) -> Option<Arc<Relay>> {
        let relay = self.relays.write().remove(&name.to_lowercase())?;
        let channel = relay.channel();
        self.hub.unregister_receiver(&channel);
        self.hub.unregister_emitter(&channel);
        Some(relay)
    }

    fn start(&self, relay: &Arc<Relay>) {
        let relay = Arc::clone(relay);
        tokio::spawn(async move {
            if let Err(e) = relay.init().await {
                warn!(relay = %relay.name(), error = %e, "Unable to initialize relay");
            }
        });
    }

    // -------------------------------------------------------------------------
    // Stack assembly
    // -------------------------------------------------------------------------

    /// Checks the structure of a stack and returns it transport first.
    fn order_stack(&self, mut layers: Vec<RelayLayer>) -> RelayResult<Vec<RelayLayer>> {
        if layers.len() < 2 {
            return Err(RelayError::configuration(
                "Every relay must have at least 1 transport and 1 protocol.",
            ));
        }
        let components = self.components.read();

        let first = &layers[0].name;
        if !components.contains(ComponentKind::Transport, first)
            && components.contains(ComponentKind::Protocol, first)
        {
            if !self.settings.allow_reversed_stacks {
                return Err(RelayError::configuration(format!(
                    "{first} is a protocol, but a relay must be written from the transport to the protocol."
                )));
            }
            debug!(first = %first, "Reversing protocol-first relay stack");
            layers.reverse();
        }

        for (index, layer) in layers.iter().enumerate() {
            let kind = kind_at(index, layers.len());
            if !components.contains(kind, &layer.name) {
                return Err(unknown_component(kind, &layer.name));
            }
        }
        Ok(layers)
    }

    /// Builds the live relay for a stored configuration.
    fn build_relay(&self, mut config: RelayConfig) -> RelayResult<Arc<Relay>> {
        config.layers = self.order_stack(config.layers)?;
        let last = config.layers.len() - 1;

        let components = self.components.read();
        let transport = build_layer(
            &components.transports,
            ComponentKind::Transport,
            &config.layers[0],
            &self.services,
        )?;
        let layers = config.layers[1..last]
            .iter()
            .map(|layer| build_layer(&components.layers, ComponentKind::Layer, layer, &self.services))
            .collect::<RelayResult<Vec<_>>>()?;
        let protocol = build_layer(
            &components.protocols,
            ComponentKind::Protocol,
            &config.layers[last],
            &self.services,
        )?;
        drop(components);

        Ok(Relay::new(
            config,
            transport,
            layers,
            protocol,
            Arc::downgrade(&self.hub),
        ))
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Creates a relay from an expression such as
    /// `websocket(server="wss://ws.nadybot.org") aes-gcm-encryption(password="x") nadynative()`.
    pub async fn create_relay(&self, name: &str, expression: &str) -> RelayResult<Arc<Relay>> {
        let layers = expression::parse(expression)?
            .into_iter()
            .map(RelayLayer::from)
            .collect();
        self.create_relay_from_layers(name, layers).await
    }

    /// Creates, stores and starts a relay.
    ///
    /// On error nothing is stored and nothing is registered.
    pub async fn create_relay_from_layers(
        &self,
        name: &str,
        layers: Vec<RelayLayer>,
    ) -> RelayResult<Arc<Relay>> {
        let max = self.settings.max_name_length.min(MAX_RELAY_NAME_LENGTH);
        if name.is_empty() || name.chars().count() > max {
            return Err(RelayError::InvalidName {
                name: name.to_string(),
                max,
            });
        }
        if self.relay_by_name(name).is_some()
            || self.storage.relays().find_by_name(name).await?.is_some()
        {
            return Err(RelayError::DuplicateName(name.to_string()));
        }
        let layers = self.order_stack(layers)?;

        let mut tx = self.storage.begin().await?;
        let stored = match relay_store::insert(&mut tx, &RelayConfig::new(name, layers)).await {
            Ok(stored) => stored,
            Err(e) => {
                discard(tx).await;
                return Err(e.into());
            }
        };
        let relay = match self.build_relay(stored) {
            Ok(relay) => relay,
            Err(e) => {
                discard(tx).await;
                return Err(e);
            }
        };
        if !self.add_relay(&relay) {
            discard(tx).await;
            return Err(RelayError::DuplicateName(name.to_string()));
        }
        if let Err(e) = commit(tx).await {
            self.remove_relay(name);
            return Err(e.into());
        }

        info!(relay = %name, id = relay.id(), "Relay added");
        if !self.hub.has_route_for(&relay.channel()) {
            info!(
                relay = %name,
                channel = %relay.channel(),
                "Relay has no routes yet; no messages will be exchanged until one is added"
            );
        }
        self.start(&relay);
        Ok(relay)
    }

    /// Deletes a stored relay and tears down its live counterpart.
    ///
    /// Returns `true` if a live relay was stopped.
    pub async fn delete_relay(&self, config: &RelayConfig) -> RelayResult<bool> {
        let mut tx = self.storage.begin().await?;
        match relay_store::delete(&mut tx, config.id).await {
            Ok(true) => {}
            Ok(false) => {
                discard(tx).await;
                return Err(RelayError::NotFound(format!("#{}", config.id)));
            }
            Err(e) => {
                discard(tx).await;
                return Err(e.into());
            }
        }
        commit(tx).await?;
        info!(relay = %config.name, id = config.id, "Relay deleted");

        let Some(relay) = self.remove_relay(&config.name) else {
            return Ok(false);
        };
        relay.deinit().await;
        Ok(true)
    }

    pub async fn delete_relay_by_name(&self, name: &str) -> RelayResult<bool> {
        let config = self
            .storage
            .relays()
            .find_by_name(name)
            .await?
            .ok_or_else(|| RelayError::NotFound(name.to_string()))?;
        self.delete_relay(&config).await
    }

    /// Builds and starts every stored relay that is not running yet.
    ///
    /// Relays that cannot be built are logged and skipped. Returns the
    /// number started.
    pub async fn load_relays(&self) -> StorageResult<usize> {
        let mut loaded = 0;
        for config in self.storage.relays().list().await? {
            if self.relay_by_name(&config.name).is_some() {
                continue;
            }
            let name = config.name.clone();
            match self.build_relay(config) {
                Ok(relay) => {
                    if self.add_relay(&relay) {
                        self.start(&relay);
                        loaded += 1;
                    }
                }
                Err(e) => warn!(relay = %name, error = %e, "Unable to load relay"),
            }
        }
        info!(count = loaded, "Loaded relays");
        Ok(loaded)
    }

    /// Stops every live relay. Stored configurations are kept.
    pub async fn shutdown(&self) {
        let relays: Vec<_> = self.relays().iter().map(|r| r.name().to_string()).collect();
        for name in relays {
            if let Some(relay) = self.remove_relay(&name) {
                relay.deinit().await;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    pub async fn relay_configs(&self) -> StorageResult<Vec<RelayConfig>> {
        self.storage.relays().list().await
    }

    /// The layer expression of a stored relay.
    ///
    /// Secret arguments are hidden unless `private` is set. Arguments of
    /// components that are no longer registered are all treated as secret.
    pub fn describe(&self, config: &RelayConfig, private: bool) -> String {
        let components = self.components.read();
        let len = config.layers.len();
        config
            .layers
            .iter()
            .enumerate()
            .map(|(index, layer)| {
                render_layer(&components, kind_at(index, len), layer, private)
                    .unwrap_or_else(|| layer.render(|_| !private))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Summaries of all stored relays.
    pub async fn overview(&self, private: bool) -> StorageResult<Vec<RelayOverview>> {
        let configs = self.storage.relays().list().await?;
        let components = self.components.read();
        let overviews = configs
            .into_iter()
            .map(|config| {
                let len = config.layers.len();
                let mut rendered = config.layers.iter().enumerate().map(|(index, layer)| {
                    render_layer(&components, kind_at(index, len), layer, private)
                        .unwrap_or_else(|| format!("{}(error)", layer.name))
                });
                let transport = rendered.next().unwrap_or_default();
                let mut layers: Vec<String> = rendered.collect();
                let protocol = layers.pop().unwrap_or_default();
                RelayOverview {
                    id: config.id,
                    status: self.relay_by_name(&config.name).map(|r| r.status()),
                    name: config.name,
                    transport,
                    layers,
                    protocol,
                }
            })
            .collect();
        Ok(overviews)
    }
}

impl std::fmt::Debug for RelayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayController")
            .field("relays", &self.relays.read().len())
            .field("components", &*self.components.read())
            .field("settings", &self.settings)
            .finish()
    }
}

fn unknown_component(kind: ComponentKind, name: &str) -> RelayError {
    let what = match kind {
        ComponentKind::Transport => "known transport for relaying",
        ComponentKind::Layer => "known layer for relaying",
        ComponentKind::Protocol => "known relay protocol",
    };
    RelayError::configuration(format!(
        "{name} is not a {what}. Perhaps the order was wrong?"
    ))
}

fn build_layer<T: ?Sized>(
    registry: &Registry<T>,
    kind: ComponentKind,
    layer: &RelayLayer,
    services: &ServiceMap,
) -> RelayResult<Arc<T>> {
    let built = registry
        .build(&layer.name, layer.key_values(), services)
        .ok_or_else(|| unknown_component(kind, &layer.name))?;
    Ok(built?)
}

async fn discard(tx: StorageTransaction) {
    if let Err(e) = rollback(tx).await {
        warn!(error = %e, "Rollback failed");
    }
}
