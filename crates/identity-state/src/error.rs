//! Identity runtime error types.

use session_runtime::{AuthError, ConnectorError};
use thiserror::Error;

/// Identity runtime error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Session failure (login, refresh, missing tokens)
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Backend failure outside the session flow
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Request rejected locally, before any backend call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Tenant could not be resolved or loaded
    #[error("Tenant error: {0}")]
    Tenant(String),
}

/// Result type alias using IdentityError.
pub type IdentityResult<T> = Result<T, IdentityError>;
