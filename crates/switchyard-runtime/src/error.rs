//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The database could not be opened or its schema created.
    #[error("Database error: {0}")]
    Storage(#[from] switchyard_storage::StorageError),

    #[error("Failed to load routes: {0}")]
    Routing(#[from] switchyard_routing::RouteError),

    #[error("Relay error: {0}")]
    Relay(#[from] switchyard_relay::RelayError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
