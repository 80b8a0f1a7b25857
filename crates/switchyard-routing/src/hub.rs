//! The message hub.
//!
//! [`MessageHub`] owns the channel registries, the routing table, the event
//! modifier registry and the hop styles. Every event that should travel
//! between channels is submitted to [`MessageHub::handle`], which matches its
//! origin against the routing table and delivers it to each destination's
//! receiver.
//!
//! # Routing table
//!
//! Routes are bucketed as `source pattern → destination pattern → [routes]`
//! in insertion order. A two-way route is stored once per direction.
//!
//! # Reentrancy
//!
//! Locks are only held for short copies. `handle` works on a snapshot of the
//! table, so modifiers and receivers may add or delete routes, register
//! channels or route further events while a dispatch is in progress.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{Instrument, debug, debug_span, warn};

use switchyard_core::glob::{self, hop_argument, normalize_hop_pattern};
use switchyard_core::{
    Character, ClassSpec, Component, HopColor, HopFormat, HopFormats, RawArgs, Registry,
    RoutableEvent, RouteRecord, ServiceMap, Source, ValidationResult, hop,
};
use switchyard_storage::{HopStyleRepository, StorageResult};

use crate::channel::{BuddyWatcher, MessageEmitter, MessageReceiver, NoBuddyWatcher};
use crate::error::{RouteError, RouteResult};
use crate::modifier::{EventModifier, MODIFIER_KIND, collect_modifiers};
use crate::route::{ConfiguredModifier, MessageRoute};
use crate::styles::{ColorField, HopColors};

/// Reason passed to the [`BuddyWatcher`] for routes to single characters.
const BUDDY_REASON: &str = "msg_hub";

/// Default color for bot-originated text.
pub const DEFAULT_SYSTEM_COLOR: &str = "89D2E8";

// =============================================================================
// Delivery status
// =============================================================================

/// Outcome of [`MessageHub::handle`], ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DeliveryStatus {
    /// No route matched, or no receiver existed for any match.
    NotRouted = 0,
    /// A route matched but every delivery was dropped or failed.
    Discarded = 1,
    /// At least one receiver accepted the event.
    Delivered = 2,
}

// =============================================================================
// Settings
// =============================================================================

/// Static settings of a hub.
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// The bot's own character; events attributed to it use the system color.
    pub bot: Option<Character>,
    /// Hex color (without `#`) for bot-originated text.
    pub default_system_color: String,
    /// Whether channels should color hop tags and text by default.
    pub colorize: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            bot: None,
            default_system_color: DEFAULT_SYSTEM_COLOR.to_string(),
            colorize: true,
        }
    }
}

// =============================================================================
// Routing table
// =============================================================================

#[derive(Clone, Default)]
struct DestinationBucket {
    destination: String,
    routes: Vec<Arc<MessageRoute>>,
}

#[derive(Clone, Default)]
struct SourceBucket {
    source: String,
    destinations: Vec<DestinationBucket>,
}

#[derive(Clone, Default)]
struct RouteTable {
    sources: Vec<SourceBucket>,
}

impl RouteTable {
    fn insert(&mut self, source: &str, destination: &str, route: Arc<MessageRoute>) {
        let pos = match self.sources.iter().position(|b| b.source == source) {
            Some(pos) => pos,
            None => {
                self.sources.push(SourceBucket {
                    source: source.to_string(),
                    destinations: Vec::new(),
                });
                self.sources.len() - 1
            }
        };
        let bucket = &mut self.sources[pos];
        match bucket
            .destinations
            .iter_mut()
            .find(|d| d.destination == destination)
        {
            Some(dest) => dest.routes.push(route),
            None => bucket.destinations.push(DestinationBucket {
                destination: destination.to_string(),
                routes: vec![route],
            }),
        }
    }

    /// Removes every entry with `id`. Returns the removed route and the
    /// destination keys it was removed from.
    fn remove(&mut self, id: i64) -> (Option<Arc<MessageRoute>>, Vec<String>) {
        let mut removed = None;
        let mut destinations = Vec::new();
        for bucket in &mut self.sources {
            for dest in &mut bucket.destinations {
                let before = dest.routes.len();
                dest.routes.retain(|route| {
                    if route.id() == id {
                        removed.get_or_insert_with(|| Arc::clone(route));
                        false
                    } else {
                        true
                    }
                });
                if dest.routes.len() != before {
                    destinations.push(dest.destination.clone());
                }
            }
            bucket.destinations.retain(|d| !d.routes.is_empty());
        }
        self.sources.retain(|b| !b.destinations.is_empty());
        (removed, destinations)
    }
}

/// Extracts `Name` from an `aotell(Name)` pattern.
fn tell_character(pattern: &str) -> Option<&str> {
    let (kind, _) = pattern.split_once('(')?;
    if !kind.eq_ignore_ascii_case(hop::TELL) {
        return None;
    }
    hop_argument(pattern)
}

// =============================================================================
// MessageHub
// =============================================================================

/// Central router between channels.
pub struct MessageHub {
    receivers: RwLock<Vec<(String, Arc<dyn MessageReceiver>)>>,
    emitters: RwLock<Vec<(String, Arc<dyn MessageEmitter>)>>,
    routes: RwLock<RouteTable>,
    modifiers: RwLock<Registry<dyn EventModifier>>,
    formats: RwLock<HopFormats>,
    colors: RwLock<HopColors>,
    services: ServiceMap,
    buddy_watcher: Arc<dyn BuddyWatcher>,
    settings: HubSettings,
}

impl Default for MessageHub {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageHub {
    /// Creates a hub with all built-in modifiers and no routes.
    pub fn new() -> Self {
        Self {
            receivers: RwLock::new(Vec::new()),
            emitters: RwLock::new(Vec::new()),
            routes: RwLock::new(RouteTable::default()),
            modifiers: RwLock::new(collect_modifiers()),
            formats: RwLock::new(HopFormats::default()),
            colors: RwLock::new(HopColors::default()),
            services: ServiceMap::new(),
            buddy_watcher: Arc::new(NoBuddyWatcher),
            settings: HubSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: HubSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_buddy_watcher(mut self, watcher: Arc<dyn BuddyWatcher>) -> Self {
        self.buddy_watcher = watcher;
        self
    }

    /// Services handed to modifier factories.
    pub fn with_services(mut self, services: ServiceMap) -> Self {
        self.services = services;
        self
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }

    // -------------------------------------------------------------------------
    // Channels
    // -------------------------------------------------------------------------

    /// Registers a receiver under its lower-cased channel name, replacing any
    /// previous receiver for that name.
    pub fn register_receiver(&self, receiver: Arc<dyn MessageReceiver>) {
        let channel = receiver.channel_name().to_lowercase();
        let mut receivers = self.receivers.write();
        match receivers.iter_mut().find(|(name, _)| *name == channel) {
            Some(slot) => slot.1 = receiver,
            None => receivers.push((channel.clone(), receiver)),
        }
        debug!(channel = %channel, "Registered new event receiver");
    }

    pub fn unregister_receiver(&self, channel: &str) -> Option<Arc<dyn MessageReceiver>> {
        let channel = channel.to_lowercase();
        let mut receivers = self.receivers.write();
        let pos = receivers.iter().position(|(name, _)| *name == channel)?;
        debug!(channel = %channel, "Removed event receiver");
        Some(receivers.remove(pos).1)
    }

    pub fn register_emitter(&self, emitter: Arc<dyn MessageEmitter>) {
        let channel = emitter.channel_name().to_lowercase();
        let mut emitters = self.emitters.write();
        match emitters.iter_mut().find(|(name, _)| *name == channel) {
            Some(slot) => slot.1 = emitter,
            None => emitters.push((channel.clone(), emitter)),
        }
        debug!(channel = %channel, "Registered new event emitter");
    }

    pub fn unregister_emitter(&self, channel: &str) -> Option<Arc<dyn MessageEmitter>> {
        let channel = channel.to_lowercase();
        let mut emitters = self.emitters.write();
        let pos = emitters.iter().position(|(name, _)| *name == channel)?;
        debug!(channel = %channel, "Removed event emitter");
        Some(emitters.remove(pos).1)
    }

    /// Finds the receiver for a channel: exact name first, then the first
    /// registered name that matches as a glob.
    pub fn get_receiver(&self, channel: &str) -> Option<Arc<dyn MessageReceiver>> {
        let channel = channel.to_lowercase();
        let receivers = self.receivers.read();
        receivers
            .iter()
            .find(|(name, _)| *name == channel)
            .or_else(|| {
                receivers
                    .iter()
                    .find(|(name, _)| glob::matches(name, &channel))
            })
            .map(|(_, receiver)| Arc::clone(receiver))
    }

    pub fn receivers(&self) -> Vec<(String, Arc<dyn MessageReceiver>)> {
        self.receivers.read().clone()
    }

    pub fn emitters(&self) -> Vec<(String, Arc<dyn MessageEmitter>)> {
        self.emitters.read().clone()
    }

    // -------------------------------------------------------------------------
    // Routes
    // -------------------------------------------------------------------------

    /// Adds a route to the table, mirrored if it is two-way.
    pub fn add_route(&self, route: MessageRoute) -> Arc<MessageRoute> {
        let route = Arc::new(route);
        let source = route.source().to_string();
        let destination = route.destination().to_string();
        {
            let mut table = self.routes.write();
            table.insert(&source, &destination, Arc::clone(&route));
            if route.two_way() {
                table.insert(&destination, &source, Arc::clone(&route));
            }
        }
        if let Some(character) = tell_character(&destination) {
            self.buddy_watcher.add(character, BUDDY_REASON);
        }
        if route.two_way()
            && let Some(character) = tell_character(&source)
        {
            self.buddy_watcher.add(character, BUDDY_REASON);
        }
        debug!(id = route.id(), route = %route, "Added route");
        route
    }

    /// Removes the route with `id` in every direction it was added.
    pub fn delete_route_id(&self, id: i64) -> Option<Arc<MessageRoute>> {
        let (removed, destinations) = self.routes.write().remove(id);
        for destination in &destinations {
            if let Some(character) = tell_character(destination) {
                self.buddy_watcher.remove(character, BUDDY_REASON);
            }
        }
        if let Some(route) = &removed {
            debug!(id, route = %route, "Deleted route");
        }
        removed
    }

    /// All routes, each listed once, in insertion order.
    pub fn routes(&self) -> Vec<Arc<MessageRoute>> {
        let table = self.routes.read();
        let mut seen = HashSet::new();
        table
            .sources
            .iter()
            .flat_map(|b| &b.destinations)
            .flat_map(|d| &d.routes)
            .filter(|route| seen.insert(route.id()))
            .cloned()
            .collect()
    }

    /// `true` if any route's source pattern matches `sender`.
    pub fn has_route_for(&self, sender: &str) -> bool {
        let sender = sender.to_lowercase();
        self.routes
            .read()
            .sources
            .iter()
            .any(|b| glob::matches(&normalize_hop_pattern(&b.source), &sender))
    }

    // -------------------------------------------------------------------------
    // Event modifiers
    // -------------------------------------------------------------------------

    /// Registers an additional modifier. Names must be unique.
    pub fn register_event_modifier(
        &self,
        component: Component<dyn EventModifier>,
    ) -> ValidationResult<()> {
        self.modifiers.write().register(component)
    }

    /// Specs of all registered modifiers, sorted by name.
    pub fn modifier_specs(&self) -> Vec<ClassSpec> {
        self.modifiers.read().specs().cloned().collect()
    }

    /// Builds the modifier `name` with the given arguments.
    pub fn event_modifier(
        &self,
        name: &str,
        args: impl Into<RawArgs>,
    ) -> RouteResult<Arc<dyn EventModifier>> {
        let component = self
            .modifiers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RouteError::UnknownModifier(name.to_string()))?;
        Ok(component.build(MODIFIER_KIND, args, &self.services)?)
    }

    /// Turns a stored route into a live one by building its modifiers.
    pub fn create_message_route(&self, record: RouteRecord) -> RouteResult<MessageRoute> {
        let modifiers = record
            .modifiers
            .iter()
            .map(|m| {
                Ok(ConfiguredModifier {
                    name: m.modifier.clone(),
                    modifier: self.event_modifier(&m.modifier, m.key_values())?,
                })
            })
            .collect::<RouteResult<Vec<_>>>()?;
        Ok(MessageRoute::new(record, modifiers))
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Routes `event` to every matching destination.
    ///
    /// Failures of individual modifiers or receivers are logged and count as
    /// discarded; they never prevent delivery to other destinations.
    pub async fn handle(&self, event: RoutableEvent) -> DeliveryStatus {
        let Some(origin) = event.first_hop() else {
            debug!("Discarding event without path");
            return DeliveryStatus::NotRouted;
        };
        let key = origin.key();
        let span = debug_span!("route", source = %key, kind = %event.kind);
        self.dispatch(&event, &key).instrument(span).await
    }

    async fn dispatch(&self, event: &RoutableEvent, key: &str) -> DeliveryStatus {
        let table = self.routes.read().clone();
        let mut status = DeliveryStatus::NotRouted;

        for bucket in &table.sources {
            if !glob::matches(&normalize_hop_pattern(&bucket.source), key) {
                continue;
            }
            for dest in &bucket.destinations {
                let Some(receiver) = self.get_receiver(&dest.destination) else {
                    debug!(destination = %dest.destination, "No receiver registered");
                    continue;
                };
                let address = hop_argument(&dest.destination).unwrap_or(&dest.destination);

                for route in &dest.routes {
                    let modified = match route.modify_event(event) {
                        Ok(Some(modified)) => modified,
                        Ok(None) => {
                            debug!(destination = %dest.destination, route = route.id(), "Event filtered away");
                            status = status.max(DeliveryStatus::Discarded);
                            continue;
                        }
                        Err(e) => {
                            warn!(destination = %dest.destination, route = route.id(), error = %e, "Modifier failed");
                            status = status.max(DeliveryStatus::Discarded);
                            continue;
                        }
                    };
                    let outcome = match receiver.receive(&modified, address).await {
                        Ok(true) => {
                            debug!(destination = %dest.destination, "Event routed");
                            DeliveryStatus::Delivered
                        }
                        Ok(false) => {
                            debug!(destination = %dest.destination, "Receiver declined event");
                            DeliveryStatus::Discarded
                        }
                        Err(e) => {
                            warn!(destination = %dest.destination, error = %e, "Delivery failed");
                            DeliveryStatus::Discarded
                        }
                    };
                    status = status.max(outcome);
                }
            }
        }
        status
    }

    // -------------------------------------------------------------------------
    // Hop styles
    // -------------------------------------------------------------------------

    pub fn set_formats(&self, formats: Vec<HopFormat>) {
        *self.formats.write() = HopFormats::new(formats);
    }

    pub fn set_colors(&self, colors: Vec<HopColor>) {
        *self.colors.write() = HopColors::new(colors);
    }

    /// Replaces the in-memory styles with what is stored.
    pub async fn reload_styles(&self, styles: &HopStyleRepository) -> StorageResult<()> {
        let formats = styles.formats().await?;
        let colors = styles.colors().await?;
        debug!(formats = formats.len(), colors = colors.len(), "Reloaded hop styles");
        self.set_formats(formats);
        self.set_colors(colors);
        Ok(())
    }

    pub fn formats(&self) -> HopFormats {
        self.formats.read().clone()
    }

    pub fn colors(&self) -> HopColors {
        self.colors.read().clone()
    }

    pub fn hop_color(&self, scope: &str, kind: &str, name: &str, field: ColorField) -> Option<HopColor> {
        self.colors.read().find(scope, kind, name, field).cloned()
    }

    /// Renders one hop as `[label]`, colored if requested and configured.
    pub fn render_source(
        &self,
        source: &Source,
        last_hop: Option<&Source>,
        scope: &str,
        with_color: bool,
    ) -> Option<String> {
        let name = source.render(last_hop, &self.formats.read())?;
        if !with_color {
            return Some(format!("[{name}]"));
        }
        match self.hop_color(scope, &source.kind, &source.name, ColorField::Tag) {
            Some(HopColor {
                tag_color: Some(color),
                ..
            }) => Some(format!("<font color=#{color}>[{name}]<end>")),
            _ => Some(format!("[{name}]")),
        }
    }

    /// The text prepended to a routed message to show where it came from.
    ///
    /// Produces `"[hop] [hop] Name: "`. When the last hop is a tell, the
    /// sender is already identified and the name is left out.
    pub fn render_path(
        &self,
        event: &RoutableEvent,
        scope: &str,
        with_color: bool,
        with_user_link: bool,
    ) -> String {
        let mut hops = Vec::with_capacity(event.path.len());
        let mut last_hop: Option<&Source> = None;
        for source in &event.path {
            if let Some(rendered) = self.render_source(source, last_hop, scope, with_color) {
                hops.push(rendered);
            }
            last_hop = Some(source);
        }

        let mut out = String::new();
        if !hops.is_empty() {
            out.push_str(&hops.join(" "));
            out.push(' ');
        }
        let is_tell = last_hop.is_some_and(|h| h.kind == hop::TELL);
        if let Some(character) = &event.character
            && !is_tell
        {
            let in_game = last_hop.is_some_and(|h| hop::IN_GAME.contains(&h.kind.as_str()));
            if in_game && with_user_link {
                out.push_str(&format!(
                    "<a href=user://{0}>{0}</a>: ",
                    character.name
                ));
            } else {
                out.push_str(&character.name);
                out.push_str(": ");
            }
        }
        out
    }

    /// Opening font tag for the message text, or an empty string.
    pub fn text_color(&self, event: &RoutableEvent, scope: &str) -> String {
        let last_hop = event.last_hop();
        let from_bot = event.character.as_ref().is_none_or(|c| self.is_bot(c));
        if from_bot && last_hop.is_none_or(|h| h.kind != hop::SYSTEM) {
            return format!("<font color=#{}>", self.settings.default_system_color);
        }
        let Some(last_hop) = last_hop else {
            return String::new();
        };
        match self.hop_color(scope, &last_hop.kind, &last_hop.name, ColorField::Text) {
            Some(HopColor {
                text_color: Some(color),
                ..
            }) => format!("<font color=#{color}>"),
            _ => String::new(),
        }
    }

    fn is_bot(&self, character: &Character) -> bool {
        let Some(bot) = &self.settings.bot else {
            return false;
        };
        match (bot.id, character.id) {
            (Some(a), Some(b)) => a == b,
            _ => bot.name.eq_ignore_ascii_case(&character.name),
        }
    }
}

impl fmt::Debug for MessageHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHub")
            .field("receivers", &self.receivers.read().len())
            .field("emitters", &self.emitters.read().len())
            .field("routes", &self.routes().len())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use switchyard_core::{
        DeliveryError, DeliveryResult, LayerArgument, RouteModifierRecord, ValidationError,
    };

    type Log = Arc<Mutex<Vec<(String, String)>>>;

    /// Records `(channel, destination)` for every delivery.
    struct Recorder {
        channel: String,
        log: Log,
        accept: bool,
    }

    impl Recorder {
        fn new(channel: &str, log: &Log) -> Arc<Self> {
            Arc::new(Self {
                channel: channel.into(),
                log: Arc::clone(log),
                accept: true,
            })
        }
    }

    #[async_trait]
    impl MessageReceiver for Recorder {
        fn channel_name(&self) -> String {
            self.channel.clone()
        }

        async fn receive(&self, event: &RoutableEvent, destination: &str) -> DeliveryResult<bool> {
            let text = event.text().unwrap_or_default();
            self.log
                .lock()
                .push((self.channel.clone(), format!("{destination}:{text}")));
            Ok(self.accept)
        }
    }

    struct Broken;

    #[async_trait]
    impl MessageReceiver for Broken {
        fn channel_name(&self) -> String {
            "web".into()
        }

        async fn receive(&self, _event: &RoutableEvent, _destination: &str) -> DeliveryResult<bool> {
            Err(DeliveryError::receiver("web", "socket closed"))
        }
    }

    #[derive(Default)]
    struct CountingWatcher {
        calls: Mutex<Vec<String>>,
    }

    impl BuddyWatcher for CountingWatcher {
        fn add(&self, character: &str, reason: &str) {
            self.calls.lock().push(format!("+{character}/{reason}"));
        }

        fn remove(&self, character: &str, reason: &str) {
            self.calls.lock().push(format!("-{character}/{reason}"));
        }
    }

    fn from_priv(text: &str) -> RoutableEvent {
        RoutableEvent::message(vec![Source::new(hop::PRIV, "MyPriv")], text)
    }

    #[test]
    fn empty_path_is_not_routed() {
        let hub = MessageHub::new();
        hub.add_route(MessageRoute::simple(1, "*", "*", false));
        let event = RoutableEvent::message(Vec::new(), "hi");
        let status = tokio_test::block_on(hub.handle(event));
        assert_eq!(status, DeliveryStatus::NotRouted);
    }

    #[tokio::test]
    async fn two_way_route_delivers_both_directions() {
        let log = Log::default();
        let hub = MessageHub::new();
        hub.register_receiver(Recorder::new("relay(nady)", &log));
        hub.register_receiver(Recorder::new("aopriv(*)", &log));
        hub.add_route(MessageRoute::simple(1, "aopriv(*)", "relay(nady)", true));

        assert_eq!(hub.handle(from_priv("hi")).await, DeliveryStatus::Delivered);
        assert_eq!(
            log.lock().as_slice(),
            [("relay(nady)".to_string(), "nady:hi".to_string())]
        );

        log.lock().clear();
        let inbound = RoutableEvent::message(vec![Source::new(hop::RELAY, "nady")], "back");
        assert_eq!(hub.handle(inbound).await, DeliveryStatus::Delivered);
        assert_eq!(
            log.lock().as_slice(),
            [("aopriv(*)".to_string(), "*:back".to_string())]
        );
    }

    #[tokio::test]
    async fn matching_is_case_insensitive_and_bare_means_wildcard() {
        let log = Log::default();
        let hub = MessageHub::new();
        hub.register_receiver(Recorder::new("web", &log));
        hub.add_route(MessageRoute::simple(1, "AOPRIV", "web", false));

        assert_eq!(hub.handle(from_priv("x")).await, DeliveryStatus::Delivered);
        assert!(hub.has_route_for("aopriv(MyPriv)"));
        assert!(!hub.has_route_for("aoorg(Troet)"));
    }

    #[tokio::test]
    async fn missing_receiver_is_skipped() {
        let log = Log::default();
        let hub = MessageHub::new();
        hub.register_receiver(Recorder::new("web", &log));
        hub.add_route(MessageRoute::simple(1, "aopriv", "discordmsg(123)", false));
        hub.add_route(MessageRoute::simple(2, "aopriv", "web", false));

        assert_eq!(hub.handle(from_priv("x")).await, DeliveryStatus::Delivered);
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn dropped_events_only_affect_their_destination() {
        let log = Log::default();
        let hub = MessageHub::new();
        hub.register_receiver(Recorder::new("web", &log));
        hub.register_receiver(Recorder::new("aoorg", &log));

        let filtered = hub
            .create_message_route(
                RouteRecord::new("aopriv", "web").with_modifier(RouteModifierRecord::new(
                    "if-has-prefix",
                    vec![LayerArgument::new("prefix", "-")],
                )),
            )
            .unwrap();
        hub.add_route(filtered);
        assert_eq!(hub.handle(from_priv("no prefix")).await, DeliveryStatus::Discarded);

        hub.add_route(MessageRoute::simple(2, "aopriv", "aoorg", false));
        assert_eq!(hub.handle(from_priv("no prefix")).await, DeliveryStatus::Delivered);
        assert_eq!(log.lock().as_slice(), [("aoorg".to_string(), "aoorg:no prefix".to_string())]);
    }

    #[tokio::test]
    async fn receiver_errors_do_not_stop_dispatch() {
        let log = Log::default();
        let hub = MessageHub::new();
        hub.register_receiver(Arc::new(Broken));
        hub.register_receiver(Recorder::new("aoorg", &log));
        hub.add_route(MessageRoute::simple(1, "aopriv", "web", false));
        assert_eq!(hub.handle(from_priv("x")).await, DeliveryStatus::Discarded);

        hub.add_route(MessageRoute::simple(2, "aopriv", "aoorg", false));
        assert_eq!(hub.handle(from_priv("x")).await, DeliveryStatus::Delivered);
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn declining_receiver_counts_as_discarded() {
        let log = Log::default();
        let hub = MessageHub::new();
        hub.register_receiver(Arc::new(Recorder {
            channel: "web".into(),
            log: Arc::clone(&log),
            accept: false,
        }));
        hub.add_route(MessageRoute::simple(1, "aopriv", "web", false));
        assert_eq!(hub.handle(from_priv("x")).await, DeliveryStatus::Discarded);
    }

    #[test]
    fn receiver_lookup_prefers_exact_then_glob_order() {
        let log = Log::default();
        let hub = MessageHub::new();
        hub.register_receiver(Recorder::new("aopriv(*)", &log));
        hub.register_receiver(Recorder::new("aopriv(Nady)", &log));

        let exact = hub.get_receiver("AOPRIV(nady)").unwrap();
        assert_eq!(exact.channel_name(), "aopriv(Nady)");
        let glob = hub.get_receiver("aopriv(other)").unwrap();
        assert_eq!(glob.channel_name(), "aopriv(*)");
        assert!(hub.get_receiver("web").is_none());

        hub.register_receiver(Recorder::new("AOPRIV(*)", &log));
        assert_eq!(hub.receivers().len(), 2);
        assert_eq!(
            hub.get_receiver("aopriv(other)").unwrap().channel_name(),
            "AOPRIV(*)"
        );

        assert!(hub.unregister_receiver("aopriv(nady)").is_some());
        assert!(hub.unregister_receiver("aopriv(nady)").is_none());
    }

    #[tokio::test]
    async fn delete_route_removes_both_directions_only_for_that_id() {
        let log = Log::default();
        let watcher = Arc::new(CountingWatcher::default());
        let hub = MessageHub::new().with_buddy_watcher(watcher.clone());
        hub.register_receiver(Recorder::new("aotell(*)", &log));
        hub.register_receiver(Recorder::new("aoorg", &log));

        hub.add_route(MessageRoute::simple(1, "aoorg", "aotell(Nady)", true));
        hub.add_route(MessageRoute::simple(2, "aopriv", "aoorg", false));
        assert_eq!(hub.routes().len(), 2);
        assert_eq!(watcher.calls.lock().as_slice(), ["+Nady/msg_hub"]);

        let removed = hub.delete_route_id(1).unwrap();
        assert_eq!(removed.id(), 1);
        assert!(hub.delete_route_id(1).is_none());
        assert_eq!(watcher.calls.lock().as_slice(), ["+Nady/msg_hub", "-Nady/msg_hub"]);

        let remaining: Vec<_> = hub.routes().iter().map(|r| r.id()).collect();
        assert_eq!(remaining, [2]);
        let org = RoutableEvent::message(vec![Source::new(hop::ORG, "Troet")], "x");
        assert_eq!(hub.handle(org).await, DeliveryStatus::NotRouted);
        assert!(!hub.has_route_for("aotell(nady)"));
    }

    /// Deletes its own route while being delivered to.
    struct SelfRemoving {
        hub: Weak<MessageHub>,
    }

    #[async_trait]
    impl MessageReceiver for SelfRemoving {
        fn channel_name(&self) -> String {
            "web".into()
        }

        async fn receive(&self, event: &RoutableEvent, _destination: &str) -> DeliveryResult<bool> {
            if let Some(hub) = self.hub.upgrade()
                && hub.delete_route_id(1).is_some()
            {
                hub.add_route(MessageRoute::simple(3, "web", "aoorg", false));
                let mut echo = event.clone();
                echo.path = vec![Source::new(hop::WEB, "web")];
                hub.handle(echo).await;
            }
            Ok(true)
        }
    }

    #[tokio::test]
    async fn handle_is_reentrant() {
        let log = Log::default();
        let hub = Arc::new(MessageHub::new());
        hub.register_receiver(Arc::new(SelfRemoving {
            hub: Arc::downgrade(&hub),
        }));
        hub.register_receiver(Recorder::new("aoorg", &log));
        hub.add_route(MessageRoute::simple(1, "aopriv", "web", false));
        hub.add_route(MessageRoute::simple(2, "aopriv", "web", false));

        assert_eq!(hub.handle(from_priv("x")).await, DeliveryStatus::Delivered);
        // The nested event reached aoorg through the freshly added route 3.
        assert_eq!(log.lock().as_slice(), [("aoorg".to_string(), "aoorg:x".to_string())]);
        let ids: Vec<_> = hub.routes().iter().map(|r| r.id()).collect();
        assert_eq!(ids, [2, 3]);
    }

    #[test]
    fn modifier_lookup() {
        let hub = MessageHub::new();
        assert!(matches!(
            hub.event_modifier("no-such-thing", RawArgs::new()),
            Err(RouteError::UnknownModifier(_))
        ));
        assert!(matches!(
            hub.event_modifier("if-has-prefix", RawArgs::new()),
            Err(RouteError::Validation(ValidationError::MissingArgument { .. }))
        ));
        assert!(hub.event_modifier("IF-HAS-PREFIX", [("prefix", "-")]).is_ok());

        let names: Vec<_> = hub.modifier_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["if-has-prefix", "if-matches", "if-not-by"]);
    }

    #[test]
    fn duplicate_modifiers_are_rejected() {
        let hub = MessageHub::new();
        let spec = ClassSpec::new("If-Has-Prefix");
        let err = hub
            .register_event_modifier(Component::new(spec, |_, _| Err("unused".into())))
            .unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateComponent { .. }));
    }

    #[test]
    fn render_path_variants() {
        let hub = MessageHub::new();
        hub.set_colors(vec![HopColor::tag("aoorg", "FF0000")]);
        let mut event = RoutableEvent::message(
            vec![Source::new(hop::ORG, "Troet"), Source::new(hop::PRIV, "Nadybot")],
            "hi",
        )
        .with_character(switchyard_core::Character::new("Nady"));

        assert_eq!(
            hub.render_path(&event, "web", false, false),
            "[Troet] [Guest] Nady: "
        );
        assert_eq!(
            hub.render_path(&event, "web", true, true),
            "<font color=#FF0000>[Troet]<end> [Guest] <a href=user://Nady>Nady</a>: "
        );

        event.path = vec![Source::new(hop::TELL, "Nady")];
        assert_eq!(hub.render_path(&event, "web", false, true), "[Nady] ");

        hub.set_formats(vec![HopFormat::hidden("aotell")]);
        assert_eq!(hub.render_path(&event, "web", false, true), "");

        event.path = vec![Source::new(hop::WEB, "web")];
        assert_eq!(hub.render_path(&event, "aoorg", false, true), "[web] Nady: ");
    }

    #[test]
    fn text_color_rules() {
        let hub = MessageHub::new().with_settings(HubSettings {
            bot: Some(switchyard_core::Character::new("Nadybot")),
            default_system_color: "89D2E8".into(),
            ..HubSettings::default()
        });
        hub.set_colors(vec![HopColor::text("system", "FFAA00")]);

        let anonymous = RoutableEvent::message(vec![Source::new(hop::ORG, "Troet")], "x");
        assert_eq!(hub.text_color(&anonymous, "web"), "<font color=#89D2E8>");

        let system = RoutableEvent::message(vec![Source::new(hop::SYSTEM, "status")], "x");
        assert_eq!(hub.text_color(&system, "web"), "<font color=#FFAA00>");

        let user = anonymous
            .clone()
            .with_character(switchyard_core::Character::new("Someone"));
        assert_eq!(hub.text_color(&user, "web"), "");

        let own = anonymous.with_character(switchyard_core::Character::new("nadybot"));
        assert_eq!(hub.text_color(&own, "web"), "<font color=#89D2E8>");
    }
}
