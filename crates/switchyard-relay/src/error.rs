//! Relay errors.

use switchyard_core::{ParseError, ValidationError};
use switchyard_storage::StorageError;
use thiserror::Error;

/// Longest accepted relay name.
pub const MAX_RELAY_NAME_LENGTH: usize = 100;

/// Errors raised while building, running or removing relays.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The layer expression is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The stack is structurally wrong: unknown component, wrong order or
    /// too few layers.
    #[error("{0}")]
    Configuration(String),

    /// A component rejected its arguments or failed to set up.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("The relay {0} already exists.")]
    DuplicateName(String),

    #[error("The name of the relay must be between 1 and {max} characters.")]
    InvalidName { name: String, max: usize },

    #[error("Relay {0} not found.")]
    NotFound(String),

    #[error("Error saving the relay: {0}")]
    Persistence(#[from] StorageError),

    /// Sending or connecting failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A layer or protocol could not encode or decode a frame.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl RelayError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn transport(message: impl ToString) -> Self {
        Self::Transport(message.to_string())
    }

    pub fn codec(message: impl ToString) -> Self {
        Self::Codec(message.to_string())
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
