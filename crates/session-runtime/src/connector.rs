//! Backend contract for session operations.

use crate::{ConnectorError, TokenGrant};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The authenticated user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Email/password credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: AuthUser,
    pub tokens: TokenGrant,
}

/// Session operations the runtime needs from the identity backend.
///
/// Implementations own the wire transport. They should map transport
/// failures to [`ConnectorError::Network`] and credential rejections to
/// [`ConnectorError::Rejected`]; the runtime relies on that split to decide
/// what is retryable.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, ConnectorError>;

    /// Exchange a refresh token for a new grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ConnectorError>;

    /// Server-side logout. Local state is already cleared when this is called.
    async fn logout(&self) -> Result<(), ConnectorError>;
}
