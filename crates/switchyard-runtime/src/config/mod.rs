//! Configuration loading and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BotConfig, DatabaseConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RelayOptions,
    RoutingConfig, SpanEventConfig, SwitchyardConfig,
};
pub use validation::validate_config;
