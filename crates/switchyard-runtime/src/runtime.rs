//! Startup and shutdown orchestration.
//!
//! ```rust,ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! let runtime = SwitchyardRuntime::builder()
//!     .config_file("switchyard.toml")
//!     .build()
//!     .await?;
//! runtime.hub().register_receiver(my_channel);
//! runtime.run().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tracing::{error, info, warn};

use switchyard_core::{Character, ServiceMap};
use switchyard_relay::{BotIdentity, RelayComponents, RelayController, RelaySettings};
use switchyard_routing::{BuddyWatcher, HubSettings, MessageHub, RouteController};
use switchyard_storage::Storage;

use crate::config::{ConfigLoader, SwitchyardConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured Switchyard instance: database, hub and both controllers.
pub struct SwitchyardRuntime {
    config: SwitchyardConfig,
    storage: Storage,
    hub: Arc<MessageHub>,
    routes: RouteController,
    relays: Arc<RelayController>,
    running: AtomicBool,
}

impl SwitchyardRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The hub hosts register their channels with.
    pub fn hub(&self) -> &Arc<MessageHub> {
        &self.hub
    }

    pub fn routes(&self) -> &RouteController {
        &self.routes
    }

    pub fn relays(&self) -> &Arc<RelayController> {
        &self.relays
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Loads stored routes and hop styles, then starts stored relays.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Ok(());
        }
        info!(bot = %self.config.bot.name, "Starting Switchyard runtime");

        let routes = self.routes.load_routes().await?;
        let relays = self.relays.load_relays().await?;
        info!(routes, relays, "Runtime started");
        Ok(())
    }

    /// Tears down every live relay. Stored data is untouched.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return;
        }
        info!("Stopping Switchyard runtime");
        self.relays.shutdown().await;
        info!("Runtime stopped");
    }

    /// Starts, waits for Ctrl+C or SIGTERM, then stops.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Switchyard is running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await;
        Ok(())
    }

    /// Like [`run`](Self::run) but stops when `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await;
        Ok(())
    }
}

impl std::fmt::Debug for SwitchyardRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchyardRuntime")
            .field("bot", &self.config.bot.name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "Unable to listen for SIGTERM");
                wait_for_ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = wait_for_ctrl_c() => {}
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Unable to listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`SwitchyardRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    services: ServiceMap,
    components: Option<RelayComponents>,
    buddy_watcher: Option<Arc<dyn BuddyWatcher>>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            services: ServiceMap::new(),
            components: None,
            buddy_watcher: None,
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Configuration that overrides files and environment.
    pub fn merge(mut self, config: SwitchyardConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// A service made available to relay components and event modifiers.
    pub fn service<T: ?Sized + Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.services.insert(service);
        self
    }

    /// Replaces the built-in relay components.
    pub fn components(mut self, components: RelayComponents) -> Self {
        self.components = Some(components);
        self
    }

    pub fn buddy_watcher(mut self, watcher: Arc<dyn BuddyWatcher>) -> Self {
        self.buddy_watcher = Some(watcher);
        self
    }

    /// Leaves the global `tracing` subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads configuration, opens the database and wires the hub and
    /// controllers together. Nothing is loaded from the database yet.
    pub async fn build(self) -> RuntimeResult<SwitchyardRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let storage =
            Storage::open(&config.database.url, config.database.max_connections).await?;

        let bot = Character {
            dimension: Some(config.bot.dimension),
            ..Character::new(&config.bot.name)
        };
        let services = self.services.with(Arc::new(BotIdentity(bot.clone())));

        let mut hub = MessageHub::new()
            .with_settings(HubSettings {
                bot: Some(bot),
                default_system_color: config.routing.default_system_color.clone(),
                colorize: config.routing.colorize,
            })
            .with_services(services.clone());
        if let Some(watcher) = self.buddy_watcher {
            hub = hub.with_buddy_watcher(watcher);
        }
        let hub = Arc::new(hub);

        let routes = RouteController::new(Arc::clone(&hub), storage.clone());
        let mut relays = RelayController::new(Arc::clone(&hub), storage.clone())
            .with_services(services)
            .with_settings(RelaySettings {
                allow_reversed_stacks: config.relay.allow_reversed_stacks,
                max_name_length: config.relay.max_name_length,
            });
        if let Some(components) = self.components {
            relays = relays.with_components(components);
        }

        info!(
            bot = %config.bot.name,
            database = %config.database.url,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(SwitchyardRuntime {
            config,
            storage,
            hub,
            routes,
            relays: Arc::new(relays),
            running: AtomicBool::new(false),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
