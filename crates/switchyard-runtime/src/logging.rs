//! Logging setup on top of `tracing-subscriber`.
//!
//! The subscriber is described by the same [`LoggingConfig`] the
//! configuration file uses; [`LoggingBuilder`] only adds programmatic
//! tweaks on top of it.
//!
//! ```rust,ignore
//! use switchyard_runtime::config::{LogLevel, SpanEventConfig};
//! use switchyard_runtime::logging::LoggingBuilder;
//!
//! LoggingBuilder::new()
//!     .filter("switchyard_relay", LogLevel::Debug)
//!     .span_events(SpanEventConfig::LIFECYCLE)
//!     .init();
//! ```
//!
//! `RUST_LOG`, when set, replaces the configured base level. Per-target
//! filters are added on top either way.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "switchyard.log";

impl SpanEventConfig {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Span creation and close. Message dispatch runs in a `route` span, so
    /// this shows how long each event took to route.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    fn fmt_span(&self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

/// Initializes logging from configuration. Does nothing if a global
/// subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    LoggingBuilder::from_config(config).init();
}

/// Builder for the global `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    config: LoggingConfig,
    with_target: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::from_config(&LoggingConfig::default())
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
            with_target: true,
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// Sets the level for one target, e.g. `switchyard_routing`.
    pub fn filter(mut self, target: impl Into<String>, level: LogLevel) -> Self {
        self.config.filters.insert(target.into(), level);
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn span_events(mut self, events: SpanEventConfig) -> Self {
        self.config.span_events = events;
        self
    }

    /// Writes to `path` instead of the console.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = LogOutput::File;
        self.config.file_path = Some(path.into());
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_str()));
        for (target, level) in &self.config.filters {
            match format!("{target}={level}").parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("Ignoring invalid log filter for '{target}': {e}"),
            }
        }
        filter
    }

    /// Installs the subscriber, ignoring failures.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber. Fails if one is already installed.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.env_filter();
        let spans = self.config.span_events.fmt_span();
        let location = self.config.file_location;

        macro_rules! layer {
            ($layer:expr) => {
                $layer
                    .with_span_events(spans.clone())
                    .with_target(self.with_target)
                    .with_thread_ids(self.config.thread_ids)
                    .with_file(location)
                    .with_line_number(location)
            };
        }

        macro_rules! install {
            ($writer:expr) => {{
                let registry = tracing_subscriber::registry().with(filter);
                match self.config.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => registry
                        .with(fmt::layer().json().with_span_events(spans.clone()).with_writer($writer))
                        .try_init(),
                    LogFormat::Compact => registry
                        .with(layer!(fmt::layer().compact().with_writer($writer)))
                        .try_init(),
                    LogFormat::Pretty => registry
                        .with(layer!(fmt::layer().pretty().with_writer($writer)))
                        .try_init(),
                    _ => registry.with(layer!(fmt::layer().with_writer($writer))).try_init(),
                }
            }};
        }

        match (self.config.output, self.config.file_path.as_deref()) {
            (LogOutput::Stdout, _) => install!(std::io::stdout),
            (LogOutput::Stderr, _) => install!(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let appender = tracing_appender::rolling::never(
                    path.parent().unwrap_or_else(|| Path::new(".")),
                    path.file_name().unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE)),
                );
                install!(appender)
            }
            (LogOutput::File, None) => {
                eprintln!("Log output is 'file' but no file_path is set, logging to stdout");
                install!(std::io::stdout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_tweaks_the_loaded_configuration() {
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            thread_ids: true,
            ..Default::default()
        };

        let builder = LoggingBuilder::from_config(&config)
            .filter("switchyard_relay", LogLevel::Trace)
            .file("/tmp/switchyard/bot.log");
        assert_eq!(builder.config.level, LogLevel::Debug);
        assert_eq!(builder.config.format, LogFormat::Pretty);
        assert_eq!(builder.config.filters["switchyard_relay"], LogLevel::Trace);
        assert_eq!(builder.config.output, LogOutput::File);
        assert!(builder.config.thread_ids);
    }

    #[test]
    fn filters_become_directives() {
        let filter = LoggingBuilder::new()
            .level(LogLevel::Warn)
            .filter("switchyard_routing", LogLevel::Trace)
            .env_filter()
            .to_string();
        assert!(filter.contains("switchyard_routing=trace"));
    }

    #[test]
    fn span_event_flags() {
        assert_eq!(SpanEventConfig::NONE.fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEventConfig::LIFECYCLE.fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
    }
}
