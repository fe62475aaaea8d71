//! Session error types.

use thiserror::Error;

/// Failure reported by an identity connector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Transport failure; the request may not have reached the backend
    #[error("Network error: {0}")]
    Network(String),

    /// The backend refused the credentials or refresh token
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything else (malformed response, server bug)
    #[error("Unexpected connector error: {0}")]
    Unexpected(String),
}

impl ConnectorError {
    /// Returns true if the request can be retried as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::Network(_))
    }
}

/// Session error type.
///
/// `Clone` so that a single refresh outcome can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Invalid credentials or rejected refresh token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No tokens are stored
    #[error("Not logged in")]
    NotLoggedIn,

    /// Persisted session data could not be read
    #[error("Malformed session: {0}")]
    MalformedSession(String),

    /// The session was logged out or replaced while a refresh was in flight
    #[error("Session ended during refresh")]
    SessionEnded,

    /// The refresh task stopped without publishing a result
    #[error("Token refresh aborted")]
    RefreshAborted,

    /// Transient connector failure (transient, can retry)
    #[error("Network error: {0}")]
    Network(String),

    /// Connector failure that is neither a rejection nor a network error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}

impl From<ConnectorError> for AuthError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Network(msg) => AuthError::Network(msg),
            ConnectorError::Rejected(msg) => AuthError::Authentication(msg),
            ConnectorError::NotFound(msg) | ConnectorError::Unexpected(msg) => {
                AuthError::Backend(msg)
            }
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
