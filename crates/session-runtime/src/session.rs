//! Session manager composing the token store, refresh coordinator and
//! proactive scheduler.

use crate::refresh::{RefreshCoordinator, RefreshPolicy};
use crate::scheduler::ProactiveRefreshScheduler;
use crate::session_fsm::{SessionMachineInput, SessionPhase};
use crate::signals::{InvalidationCallback, SessionSignals, SessionStateCallback};
use crate::{
    AuthError, AuthResult, AuthUser, Clock, Credentials, SessionConnector, SystemClock, TokenGrant, TokenPair,
    TokenStore, DEFAULT_TOKEN_TYPE,
};
use chrono::{DateTime, Utc};
use identity_config_and_utils::SessionConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Timing and retry options for a session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Tokens expiring within this margin are refreshed before use.
    pub proactive_margin: Duration,
    /// Floor between consecutive proactive refreshes.
    pub min_rearm_delay: Duration,
    pub refresh: RefreshPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            proactive_margin: Duration::from_secs(config.proactive_margin_secs),
            min_rearm_delay: Duration::from_millis(config.min_rearm_delay_ms),
            refresh: RefreshPolicy::from(config),
        }
    }
}

/// `Authorization` header for backend requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthHeaders {
    #[serde(rename = "Authorization")]
    pub authorization: String,
}

impl AuthHeaders {
    /// Header name and value.
    pub fn header(&self) -> (&'static str, &str) {
        ("Authorization", &self.authorization)
    }
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub tokens: Option<TokenPair>,
    /// Tokens are present and `now < expires_at`.
    pub is_valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    /// A refresh call is outstanding.
    pub is_refreshing: bool,
}

/// Keeps an access token valid for any number of concurrent consumers.
///
/// Owned by the composition root and shared through `Arc`.
pub struct IdentitySessionManager {
    store: Arc<TokenStore>,
    connector: Arc<dyn SessionConnector>,
    coordinator: Arc<RefreshCoordinator>,
    scheduler: ProactiveRefreshScheduler,
    signals: Arc<SessionSignals>,
    last_activity: Mutex<Option<DateTime<Utc>>>,
}

impl IdentitySessionManager {
    /// Create a manager over an existing store.
    ///
    /// If the store already holds tokens (restored from persistence), the
    /// session starts as logged in and the proactive timer is armed.
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        store: Arc<TokenStore>,
        options: SessionOptions,
    ) -> Self {
        let signals = Arc::new(SessionSignals::new(Arc::clone(&store)));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&connector),
            Arc::clone(&signals),
            options.refresh,
            options.proactive_margin,
        ));
        let scheduler = ProactiveRefreshScheduler::new(
            Arc::clone(&coordinator),
            Arc::clone(&store),
            options.min_rearm_delay,
        );

        let manager = Self {
            store,
            connector,
            coordinator,
            scheduler,
            signals,
            last_activity: Mutex::new(None),
        };

        if manager.store.get().is_some() {
            manager
                .signals
                .transition_or_skip(&SessionMachineInput::TokensSet);
            manager.scheduler.arm();
        }

        manager
    }

    /// Create a manager with no persistence, using the system clock.
    pub fn in_memory(connector: Arc<dyn SessionConnector>, options: SessionOptions) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::new(connector, Arc::new(TokenStore::in_memory(clock)), options)
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Set a callback to be notified of session phase changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        self.signals.set_state_callback(callback);
    }

    /// Set a callback invoked when a failed refresh ends the session.
    pub fn set_invalidation_callback(&self, callback: InvalidationCallback) {
        self.signals.set_invalidation_callback(callback);
    }

    pub fn phase(&self) -> SessionPhase {
        self.signals.phase()
    }

    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    /// Return a valid access token, refreshing if needed.
    ///
    /// Returns immediately when the current token is outside the proactive
    /// margin. Concurrent callers facing an expired token share one refresh.
    pub async fn get_valid_access_token(&self) -> AuthResult<String> {
        let result = self.coordinator.get_valid_access_token().await;
        if result.is_ok() {
            *self.last_activity.lock() = Some(self.store.now());
        }
        result
    }

    /// `Authorization` header for the current (refreshed if needed) token.
    pub async fn get_auth_headers(&self) -> AuthResult<AuthHeaders> {
        let access_token = self.get_valid_access_token().await?;
        let token_type = self
            .store
            .get()
            .filter(|pair| pair.access_token == access_token)
            .map(|pair| pair.token_type)
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        Ok(AuthHeaders {
            authorization: format!("{} {}", token_type, access_token),
        })
    }

    /// Replace the session tokens and re-arm the proactive timer.
    ///
    /// Any refresh in flight is superseded: its result is discarded.
    pub fn set_tokens(&self, grant: TokenGrant) -> TokenPair {
        let pair = self.install(grant);
        self.signals
            .transition_or_skip(&SessionMachineInput::TokensSet);
        pair
    }

    /// Log in with credentials and install the issued tokens.
    ///
    /// If the session is cleared or replaced while the backend call is in
    /// flight, the issued tokens are dropped and `SessionEnded` is returned.
    pub async fn login(&self, credentials: &Credentials) -> AuthResult<AuthUser> {
        let generation = self.store.generation();
        self.signals
            .transition(&SessionMachineInput::LoginAttempt)?;
        info!(email = %credentials.email, "Logging in");

        match self.connector.login(credentials).await {
            Ok(outcome) => {
                let Some(pair) = self.store.commit_if_generation(generation, outcome.tokens) else {
                    warn!(user_id = %outcome.user.id, "Session changed during login, discarding tokens");
                    return Err(AuthError::SessionEnded);
                };
                self.activate(&pair);
                self.signals
                    .transition_or_skip(&SessionMachineInput::LoginSuccess);
                info!(user_id = %outcome.user.id, "Login succeeded");
                Ok(outcome.user)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.signals
                    .transition_or_skip(&SessionMachineInput::LoginFailed);
                Err(e.into())
            }
        }
    }

    /// End the session.
    ///
    /// Local teardown (timer, tokens) completes before the backend is
    /// contacted; a backend failure is logged and otherwise ignored. A
    /// refresh in flight is not cancelled, but its result is discarded.
    pub async fn logout(&self) {
        self.signals
            .transition_or_skip(&SessionMachineInput::LogoutRequested);

        let had_session = self.store.get().is_some();
        self.scheduler.cancel();
        self.store.clear();
        *self.last_activity.lock() = None;
        info!(had_session, "Session cleared");

        if had_session {
            if let Err(e) = self.connector.logout().await {
                warn!(error = %e, "Backend logout failed");
            }
        }

        self.signals
            .transition_or_skip(&SessionMachineInput::LogoutComplete);
    }

    /// True if tokens are present and not expired. Never suspends.
    pub fn has_valid_session(&self) -> bool {
        !self.store.is_expired(Duration::ZERO)
    }

    pub fn session_state(&self) -> SessionState {
        let tokens = self.store.get();
        let now = self.store.now();
        SessionState {
            is_valid: tokens
                .as_ref()
                .is_some_and(|pair| !pair.is_expired_at(now, Duration::ZERO)),
            expires_at: tokens.as_ref().map(|pair| pair.expires_at),
            tokens,
            last_activity: *self.last_activity.lock(),
            is_refreshing: self.coordinator.is_refreshing(),
        }
    }

    /// True while the proactive timer is armed.
    pub fn is_refresh_scheduled(&self) -> bool {
        self.scheduler.is_armed()
    }

    fn install(&self, grant: TokenGrant) -> TokenPair {
        let pair = self.store.set(grant);
        self.activate(&pair);
        pair
    }

    fn activate(&self, pair: &TokenPair) {
        *self.last_activity.lock() = Some(self.store.now());
        self.scheduler.arm();
        debug!(expires_at = %pair.expires_at, "Tokens installed");
    }
}
