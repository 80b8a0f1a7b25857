//! Unified error types for the Switchyard core.
//!
//! Construction-time failures ([`ValidationError`], [`ParseError`]) are
//! returned to the caller with a message that can be shown to an operator
//! verbatim. Delivery-time failures ([`DeliveryError`]) are raised by
//! modifiers and receivers and swallowed by the hub after logging.

use thiserror::Error;

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors raised while binding string arguments to a plugin's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required parameter was not supplied.
    #[error("Missing required argument '{param}' to '{plugin}'.")]
    MissingArgument {
        /// Plugin the argument was meant for.
        plugin: String,
        /// Name of the missing parameter.
        param: String,
    },

    /// A `bool` parameter received something other than `true`/`false`.
    #[error("Argument '{param}' to '{plugin}' must be 'true' or 'false', '{value}' given.")]
    InvalidBool {
        plugin: String,
        param: String,
        value: String,
    },

    /// An `int` parameter received something that is not a signed integer.
    #[error("Argument '{param}' to '{plugin}' must be a number, '{value}' given.")]
    InvalidInt {
        plugin: String,
        param: String,
        value: String,
    },

    /// Arguments were supplied that the plugin does not declare.
    #[error("Unknown {} {} to '{plugin}'.", plural(keys.len()), quoted_list(keys))]
    UnknownArguments {
        plugin: String,
        /// The unconsumed argument names, in the order they were given.
        keys: Vec<String>,
    },

    /// The plugin's constructor or service injection failed.
    #[error("There was an error setting up the {plugin} {kind}: {reason}")]
    Setup {
        plugin: String,
        /// What kind of component was being built (`transport`, `layer`, `modifier`, ...).
        kind: String,
        reason: String,
    },

    /// A component with the same name is already registered.
    #[error("There is already a {kind} named '{name}'.")]
    DuplicateComponent { kind: String, name: String },
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "parameter" } else { "parameters" }
}

fn quoted_list(keys: &[String]) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("'{k}'")).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {last}", rest.join(", ")),
    }
}

impl ValidationError {
    /// Creates a setup error for the given plugin.
    pub fn setup(plugin: impl Into<String>, kind: impl Into<String>, reason: impl ToString) -> Self {
        Self::Setup {
            plugin: plugin.into(),
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Parse Errors
// =============================================================================

/// A malformed layer expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", fragment.as_ref().map(|f| format!(" near '{f}'")).unwrap_or_default())]
pub struct ParseError {
    /// Human readable description of the problem.
    pub message: String,
    /// The offending part of the input, if it could be isolated.
    pub fragment: Option<String>,
    /// Byte offset into the input where the problem was detected.
    pub position: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            fragment: None,
            position,
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

// =============================================================================
// Delivery Errors
// =============================================================================

/// Errors raised while a routed event is being transformed or delivered.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// An event modifier failed.
    #[error("modifier '{modifier}' failed: {reason}")]
    Modifier { modifier: String, reason: String },

    /// The receiving channel failed to accept the event.
    #[error("receiver '{channel}' failed: {reason}")]
    Receiver { channel: String, reason: String },
}

impl DeliveryError {
    pub fn modifier(modifier: impl Into<String>, reason: impl ToString) -> Self {
        Self::Modifier {
            modifier: modifier.into(),
            reason: reason.to_string(),
        }
    }

    pub fn receiver(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self::Receiver {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Service Errors
// =============================================================================

/// A component asked for a shared service that the host never provided.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("service not available: {0}")]
pub struct MissingService(pub &'static str);

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for argument binding.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for modifiers and receivers.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
