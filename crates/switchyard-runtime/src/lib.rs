//! Switchyard Runtime - configuration, logging and startup for a Switchyard
//! instance.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `SwitchyardConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - Startup orchestration (`SwitchyardRuntime`): opens the database, builds
//!   the message hub, and loads stored routes, hop styles and relays
//!
//! ```ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SwitchyardRuntime::builder().build().await?;
//!     runtime.hub().register_receiver(my_channel);
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, DatabaseConfig, LoggingConfig,
    RelayOptions, RoutingConfig, SwitchyardConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{RuntimeBuilder, SwitchyardRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
