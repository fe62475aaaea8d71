//! Scenario tests for the session runtime.
//!
//! - `single_flight.rs` - Rules 1-6 (Deduplication & Idempotence)
//! - `proactive.rs`     - Rules 7-12 (Proactive Refresh Timer)
//! - `cancellation.rs`  - Rules 13-17 (Logout & Supersession During Refresh)
//! - `failures.rs`      - Rules 18-24 (Failure Propagation & Retry)
//! - `lifecycle.rs`     - Rules 25-32 (Login, Logout, Headers, Persistence)
//!
//! Timing-sensitive tests run on paused tokio time with a [`TokioClock`], so
//! expiry arithmetic and timers move together.


use crate::{
    AuthResult, AuthUser, Clock, ConnectorError, Credentials, IdentitySessionManager,
    LoginOutcome, RefreshPolicy, SessionConnector, SessionOptions, TokenGrant, TokenStore,
    TokioClock,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub(crate) fn secs(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}

/// Scripted connector counting backend calls.
///
/// Refreshes without a scripted result succeed with `at-<n>`/`rt-<n>`,
/// where `n` is the 1-based refresh call number.
pub(crate) struct MockConnector {
    latency: Duration,
    issued_lifetime_secs: i64,
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    scripted_refresh: Mutex<VecDeque<Result<TokenGrant, ConnectorError>>>,
    received_refresh_tokens: Mutex<Vec<String>>,
    reject_login: AtomicBool,
    fail_logout: AtomicBool,
    panic_on_refresh: AtomicBool,
}

impl MockConnector {
    pub(crate) fn new(latency: Duration) -> Self {
        Self {
            latency,
            issued_lifetime_secs: 3600,
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            scripted_refresh: Mutex::new(VecDeque::new()),
            received_refresh_tokens: Mutex::new(Vec::new()),
            reject_login: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            panic_on_refresh: AtomicBool::new(false),
        }
    }

    pub(crate) fn issuing_lifetime(mut self, secs: i64) -> Self {
        self.issued_lifetime_secs = secs;
        self
    }

    pub(crate) fn script_refresh(&self, result: Result<TokenGrant, ConnectorError>) {
        self.scripted_refresh.lock().unwrap().push_back(result);
    }

    pub(crate) fn reject_login(&self) {
        self.reject_login.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_logout(&self) {
        self.fail_logout.store(true, Ordering::SeqCst);
    }

    pub(crate) fn panic_on_refresh(&self) {
        self.panic_on_refresh.store(true, Ordering::SeqCst);
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn received_refresh_tokens(&self) -> Vec<String> {
        self.received_refresh_tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, ConnectorError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(ConnectorError::Rejected("invalid credentials".to_string()));
        }
        Ok(LoginOutcome {
            user: AuthUser::new("user-1").with_email(credentials.email.clone()),
            tokens: TokenGrant::new("at-login", "rt-login", self.issued_lifetime_secs),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ConnectorError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.received_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.panic_on_refresh.load(Ordering::SeqCst) {
            panic!("refresh backend crashed");
        }

        let scripted = self.scripted_refresh.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(TokenGrant::new(
                format!("at-{call}"),
                format!("rt-{call}"),
                self.issued_lifetime_secs,
            ))
        })
    }

    async fn logout(&self) -> Result<(), ConnectorError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(ConnectorError::Network("connection reset".to_string()));
        }
        Ok(())
    }
}

/// Options with a 60 s margin, 1 s rearm floor and no retry.
pub(crate) fn default_options() -> SessionOptions {
    SessionOptions {
        proactive_margin: secs(60),
        min_rearm_delay: secs(1),
        refresh: RefreshPolicy::default(),
    }
}

pub(crate) fn retry_options(max_attempts: u32, initial_delay_ms: u64) -> SessionOptions {
    SessionOptions {
        refresh: RefreshPolicy {
            max_attempts,
            initial_delay_ms,
            max_delay_ms: 10_000,
        },
        ..default_options()
    }
}

/// Manager on a tokio-driven clock with in-memory storage.
pub(crate) fn manager(
    connector: &Arc<MockConnector>,
    options: SessionOptions,
) -> Arc<IdentitySessionManager> {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    let store = Arc::new(TokenStore::in_memory(clock));
    Arc::new(IdentitySessionManager::new(
        connector.clone(),
        store,
        options,
    ))
}

/// Issue `n` concurrent `get_valid_access_token` calls from separate tasks.
pub(crate) async fn burst(manager: &Arc<IdentitySessionManager>, n: usize) -> Vec<AuthResult<String>> {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let manager = Arc::clone(manager);
            tokio::spawn(async move { manager.get_valid_access_token().await })
        })
        .collect();

    futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("caller task panicked"))
        .collect()
}
