//! Configuration schema.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration backed by `switchyard.db` in the working directory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use switchyard_core::DEFAULT_DIMENSION;
use switchyard_relay::MAX_RELAY_NAME_LENGTH;
use switchyard_routing::DEFAULT_SYSTEM_COLOR;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardConfig {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub routing: RoutingConfig,
    pub relay: RelayOptions,
    pub logging: LoggingConfig,
}

/// Identity of the bot this process runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// The bot's own character name.
    pub name: String,
    /// Game server the bot lives on; the default `server` of every hop.
    pub dimension: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Switchyard".to_string(),
            dimension: DEFAULT_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://switchyard.db?mode=rwc".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Hex color (without `#`) used for text the bot itself produces.
    pub default_system_color: String,
    /// Whether channels color hop tags and message text.
    pub colorize: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_system_color: DEFAULT_SYSTEM_COLOR.to_string(),
            colorize: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayOptions {
    /// Accept relay stacks written protocol first.
    pub allow_reversed_stacks: bool,
    pub max_name_length: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            allow_reversed_stacks: false,
            max_name_length: MAX_RELAY_NAME_LENGTH,
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file for `output = "file"`.
    pub file_path: Option<PathBuf>,
    /// Per-target levels, e.g. `switchyard_relay = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include source file and line.
    pub file_location: bool,
}
