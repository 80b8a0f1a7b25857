//! Routing errors.

use switchyard_core::{ParseError, ValidationError};
use switchyard_storage::StorageError;
use thiserror::Error;

/// Errors raised while building, persisting or removing routes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A modifier expression could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A modifier rejected its arguments or failed to set up.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No modifier with that name is registered.
    #[error("There is no modifier '{0}'.")]
    UnknownModifier(String),

    /// No route with that id exists.
    #[error("Route #{0} does not exist.")]
    NotFound(i64),

    /// The database write failed and was rolled back.
    #[error("Unable to store the route: {0}")]
    Persistence(#[from] StorageError),
}

/// Result type for routing operations.
pub type RouteResult<T> = Result<T, RouteError>;
