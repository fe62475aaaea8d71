//! In-process identity backend for `session simulate`.

use async_trait::async_trait;
use session_runtime::{
    AuthUser, ConnectorError, Credentials, LoginOutcome, SessionConnector, TokenGrant,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Lifetime of tokens issued by the simulated backend.
const ISSUED_LIFETIME_SECS: i64 = 3600;

/// Backend answering after a fixed latency with random opaque tokens.
pub struct SimulatedConnector {
    latency: Duration,
    reject_refresh: bool,
    refresh_calls: AtomicUsize,
}

impl SimulatedConnector {
    pub fn new(latency: Duration, reject_refresh: bool) -> Self {
        Self {
            latency,
            reject_refresh,
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// A fresh grant with random token values.
    pub fn issue(lifetime_secs: i64) -> TokenGrant {
        TokenGrant::new(
            format!("at-{}", Uuid::new_v4()),
            format!("rt-{}", Uuid::new_v4()),
            lifetime_secs,
        )
    }
}

#[async_trait]
impl SessionConnector for SimulatedConnector {
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, ConnectorError> {
        tokio::time::sleep(self.latency).await;
        Ok(LoginOutcome {
            user: AuthUser::new(Uuid::new_v4().to_string()).with_email(credentials.email.clone()),
            tokens: Self::issue(ISSUED_LIFETIME_SECS),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ConnectorError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(call, latency_ms = self.latency.as_millis() as u64, "Simulated refresh");
        tokio::time::sleep(self.latency).await;

        if self.reject_refresh {
            return Err(ConnectorError::Rejected("refresh token revoked".to_string()));
        }
        Ok(Self::issue(ISSUED_LIFETIME_SECS))
    }

    async fn logout(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}
