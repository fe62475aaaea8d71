//! Scenario tests for the identity runtime.
//!
//! - `initialization.rs` - Rules 1-8 (Hydration & Sequential Loading)
//! - `flags.rs`          - Rules 9-13 (Flag Queries & Override Updates)
//! - `session.rs`        - Rules 14-19 (Login, Logout & Session Propagation)


use crate::{IdentityConnector, IdentityRuntime, Role, StaticTenantResolver, Tenant};
use async_trait::async_trait;
use feature_flags::FlagDefinition;
use session_runtime::{
    AuthUser, Clock, ConnectorError, Credentials, LoginOutcome, RefreshPolicy, SessionConnector,
    SessionOptions, TokenGrant, TokenStore, TokioClock,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const TENANT_ID: &str = "tenant-1";

/// In-memory identity backend counting every call.
///
/// Each data endpoint can be switched to fail independently. Refreshes
/// issue `at-<n>`/`rt-<n>` unless `reject_refresh` is set.
pub(crate) struct MockBackend {
    tenant: Mutex<Tenant>,
    user: AuthUser,
    roles: Mutex<Vec<Role>>,
    flags: Mutex<HashMap<String, FlagDefinition>>,
    fail_tenant: AtomicBool,
    fail_user: AtomicBool,
    fail_roles: AtomicBool,
    fail_flags: AtomicBool,
    fail_override: AtomicBool,
    reject_login: AtomicBool,
    reject_refresh: AtomicBool,
    pub(crate) tenant_calls: AtomicUsize,
    pub(crate) user_calls: AtomicUsize,
    pub(crate) roles_calls: AtomicUsize,
    pub(crate) flags_calls: AtomicUsize,
    pub(crate) refresh_calls: AtomicUsize,
    pub(crate) logout_calls: AtomicUsize,
    override_writes: Mutex<Vec<(String, String, bool)>>,
    access_tokens_seen: Mutex<Vec<String>>,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        let mut tenant = Tenant::new(TENANT_ID, "Acme");
        tenant.flag_overrides.set("beta-dashboard", true);

        let flags = [
            FlagDefinition::new("beta-dashboard", false).admin_editable(true),
            FlagDefinition::new("dark-mode", false).admin_editable(true),
            FlagDefinition::new("new-billing", true),
            FlagDefinition::new("legacy-export", true)
                .admin_editable(true)
                .server_enabled(false),
            FlagDefinition::new("reports-v2", true).with_segment(["analyst"]),
        ];

        Self {
            tenant: Mutex::new(tenant),
            user: AuthUser::new("user-1").with_email("ada@example.com"),
            roles: Mutex::new(vec![
                Role::new("admin", ["flags:write", "users:read"]),
                Role::new("analyst", ["reports:read"]),
            ]),
            flags: Mutex::new(
                flags
                    .into_iter()
                    .map(|flag| (flag.key.clone(), flag))
                    .collect(),
            ),
            fail_tenant: AtomicBool::new(false),
            fail_user: AtomicBool::new(false),
            fail_roles: AtomicBool::new(false),
            fail_flags: AtomicBool::new(false),
            fail_override: AtomicBool::new(false),
            reject_login: AtomicBool::new(false),
            reject_refresh: AtomicBool::new(false),
            tenant_calls: AtomicUsize::new(0),
            user_calls: AtomicUsize::new(0),
            roles_calls: AtomicUsize::new(0),
            flags_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            override_writes: Mutex::new(Vec::new()),
            access_tokens_seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_tenant(&self) {
        self.fail_tenant.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_user(&self) {
        self.fail_user.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_roles(&self) {
        self.fail_roles.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_flags(&self) {
        self.fail_flags.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_override(&self) {
        self.fail_override.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reject_login(&self) {
        self.reject_login.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reject_refresh(&self) {
        self.reject_refresh.store(true, Ordering::SeqCst);
    }

    pub(crate) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Total data-endpoint calls (tenant, user, roles, flags).
    pub(crate) fn data_calls(&self) -> usize {
        Self::count(&self.tenant_calls)
            + Self::count(&self.user_calls)
            + Self::count(&self.roles_calls)
            + Self::count(&self.flags_calls)
    }

    pub(crate) fn override_writes(&self) -> Vec<(String, String, bool)> {
        self.override_writes.lock().unwrap().clone()
    }

    pub(crate) fn access_tokens_seen(&self) -> Vec<String> {
        self.access_tokens_seen.lock().unwrap().clone()
    }

    fn unavailable(flag: &AtomicBool, what: &str) -> Result<(), ConnectorError> {
        if flag.load(Ordering::SeqCst) {
            return Err(ConnectorError::Network(format!("{what} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionConnector for MockBackend {
    async fn login(&self, _credentials: &Credentials) -> Result<LoginOutcome, ConnectorError> {
        if self.reject_login.load(Ordering::SeqCst) {
            return Err(ConnectorError::Rejected("invalid credentials".to_string()));
        }
        Ok(LoginOutcome {
            user: self.user.clone(),
            tokens: TokenGrant::new("at-login", "rt-login", 3600),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ConnectorError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.reject_refresh.load(Ordering::SeqCst) {
            return Err(ConnectorError::Rejected("refresh token revoked".to_string()));
        }
        Ok(TokenGrant::new(format!("at-{call}"), format!("rt-{call}"), 3600))
    }

    async fn logout(&self) -> Result<(), ConnectorError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl IdentityConnector for MockBackend {
    async fn get_current_user(&self, access_token: &str) -> Result<AuthUser, ConnectorError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        self.access_tokens_seen
            .lock()
            .unwrap()
            .push(access_token.to_string());
        Self::unavailable(&self.fail_user, "user")?;
        Ok(self.user.clone())
    }

    async fn get_user_roles(&self, _user_id: &str) -> Result<Vec<Role>, ConnectorError> {
        self.roles_calls.fetch_add(1, Ordering::SeqCst);
        Self::unavailable(&self.fail_roles, "roles")?;
        Ok(self.roles.lock().unwrap().clone())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Tenant, ConnectorError> {
        self.tenant_calls.fetch_add(1, Ordering::SeqCst);
        Self::unavailable(&self.fail_tenant, "tenant")?;
        let tenant = self.tenant.lock().unwrap().clone();
        if tenant.id != tenant_id {
            return Err(ConnectorError::NotFound(format!("tenant {tenant_id}")));
        }
        Ok(tenant)
    }

    async fn get_feature_flags(
        &self,
        _tenant_id: &str,
    ) -> Result<HashMap<String, FlagDefinition>, ConnectorError> {
        self.flags_calls.fetch_add(1, Ordering::SeqCst);
        Self::unavailable(&self.fail_flags, "flags")?;
        Ok(self.flags.lock().unwrap().clone())
    }

    async fn update_feature_flag_override(
        &self,
        tenant_id: &str,
        flag_key: &str,
        enabled: bool,
    ) -> Result<(), ConnectorError> {
        Self::unavailable(&self.fail_override, "override")?;
        self.override_writes.lock().unwrap().push((
            tenant_id.to_string(),
            flag_key.to_string(),
            enabled,
        ));
        Ok(())
    }
}

pub(crate) fn options() -> SessionOptions {
    SessionOptions {
        proactive_margin: Duration::from_secs(60),
        min_rearm_delay: Duration::from_secs(1),
        refresh: RefreshPolicy::default(),
    }
}

/// Runtime on a tokio-driven clock resolving [`TENANT_ID`].
pub(crate) fn runtime(backend: &Arc<MockBackend>) -> IdentityRuntime {
    runtime_with_resolver(backend, StaticTenantResolver::new(TENANT_ID))
}

pub(crate) fn runtime_with_resolver(
    backend: &Arc<MockBackend>,
    resolver: StaticTenantResolver,
) -> IdentityRuntime {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
    IdentityRuntime::new(
        backend.clone(),
        Arc::new(resolver),
        Arc::new(TokenStore::in_memory(clock)),
        options(),
    )
}

/// Install a valid session, as if restored from persistence.
pub(crate) fn sign_in(runtime: &IdentityRuntime) {
    runtime
        .session()
        .set_tokens(TokenGrant::new("at-0", "rt-0", 3600));
}
