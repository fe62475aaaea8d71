//! Composition root wiring the session manager, backend and state machine.

use crate::{
    IdentityConnector, IdentityError, IdentityEvent, IdentityResult, IdentityState,
    IdentityStateMachine, InitialState, Tenant, TenantResolver,
};
use feature_flags::{FlagDecision, FlagDefinition, FlagSet, UserContext};
use session_runtime::{
    AuthError, AuthUser, Clock, Credentials, IdentitySessionManager, SessionOptions,
    SessionStateChanged, SystemClock, TokenStore,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Owns the identity session and the state derived from it.
///
/// Session phase changes and terminal refresh failures flow into the state
/// machine automatically; everything else is loaded by [`initialize`] or
/// dispatched by the operations below.
///
/// [`initialize`]: IdentityRuntime::initialize
pub struct IdentityRuntime {
    connector: Arc<dyn IdentityConnector>,
    resolver: Arc<dyn TenantResolver>,
    session: Arc<IdentitySessionManager>,
    machine: Arc<IdentityStateMachine>,
}

impl IdentityRuntime {
    pub fn new<C>(
        connector: Arc<C>,
        resolver: Arc<dyn TenantResolver>,
        store: Arc<TokenStore>,
        options: SessionOptions,
    ) -> Self
    where
        C: IdentityConnector + 'static,
    {
        let session = Arc::new(IdentitySessionManager::new(
            connector.clone(),
            store,
            options,
        ));
        let machine = Arc::new(IdentityStateMachine::new());

        let on_change = Arc::clone(&machine);
        session.set_state_callback(Box::new(move |change: SessionStateChanged| {
            on_change.dispatch(IdentityEvent::SessionChanged {
                is_valid: change.is_valid,
                is_refreshing: change.is_refreshing,
            });
        }));

        let on_invalidated = Arc::clone(&machine);
        session.set_invalidation_callback(Box::new(move |error: &AuthError| {
            on_invalidated.dispatch(IdentityEvent::SessionInvalidated {
                reason: error.to_string(),
            });
        }));

        Self {
            connector,
            resolver,
            session,
            machine,
        }
    }

    /// Runtime with no session persistence.
    pub fn in_memory<C>(
        connector: Arc<C>,
        resolver: Arc<dyn TenantResolver>,
        options: SessionOptions,
    ) -> Self
    where
        C: IdentityConnector + 'static,
    {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::new(
            connector,
            resolver,
            Arc::new(TokenStore::in_memory(clock)),
            options,
        )
    }

    pub fn session(&self) -> &Arc<IdentitySessionManager> {
        &self.session
    }

    /// Load tenant, user, roles and flags.
    ///
    /// A complete `initial` state (tenant and user both present) is applied
    /// as-is without contacting the backend. Otherwise the steps run in
    /// order; only a tenant failure aborts the pass.
    pub async fn initialize(&self, initial: Option<InitialState>) -> IdentityResult<()> {
        match initial {
            Some(initial) if initial.is_complete() => {
                info!("Hydrating identity state");
                self.machine.dispatch(IdentityEvent::Hydrated(initial));
                self.sync_session();
                return Ok(());
            }
            Some(_) => debug!("Initial state incomplete, loading from backend"),
            None => {}
        }

        let tenant = self.load_tenant().await?;
        if let Some(user) = self.load_user().await {
            self.load_roles(&user.id).await;
        }
        self.load_flags(&tenant.id).await;
        self.sync_session();

        info!(tenant_id = %tenant.id, "Identity state initialized");
        Ok(())
    }

    pub async fn login(&self, credentials: &Credentials) -> IdentityResult<AuthUser> {
        self.machine.dispatch(IdentityEvent::AuthLoading);

        match self.session.login(credentials).await {
            Ok(user) => {
                self.machine
                    .dispatch(IdentityEvent::UserAuthenticated(user.clone()));
                self.load_roles(&user.id).await;
                Ok(user)
            }
            Err(e) => {
                self.machine.dispatch(IdentityEvent::Unauthenticated {
                    error: Some(e.to_string()),
                });
                Err(e.into())
            }
        }
    }

    pub async fn logout(&self) {
        self.session.logout().await;
        self.machine.dispatch(IdentityEvent::LoggedOut);
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.machine.with(|state| state.is_enabled(key))
    }

    pub fn get_flag(&self, key: &str) -> Option<FlagDefinition> {
        self.machine.with(|state| state.get_flag(key).cloned())
    }

    pub fn evaluate_flag(&self, key: &str) -> Option<FlagDecision> {
        self.machine.with(|state| state.evaluate_flag(key))
    }

    pub fn can_edit(&self, key: &str) -> bool {
        self.machine.with(|state| state.can_edit(key))
    }

    /// Set the tenant override for an admin-editable flag.
    ///
    /// Only the override axis changes; the flag definitions are untouched.
    pub async fn update_flag(&self, key: &str, enabled: bool) -> IdentityResult<()> {
        if !self.can_edit(key) {
            return Err(IdentityError::Validation(format!(
                "flag '{}' is not editable",
                key
            )));
        }

        let tenant_id = self
            .machine
            .with(|state| state.tenant().map(|tenant| tenant.id.clone()))
            .ok_or_else(|| IdentityError::Tenant("no tenant resolved".to_string()))?;

        self.connector
            .update_feature_flag_override(&tenant_id, key, enabled)
            .await?;

        self.machine.dispatch(IdentityEvent::FlagOverrideUpdated {
            key: key.to_string(),
            enabled,
        });
        info!(tenant_id = %tenant_id, flag = key, enabled, "Flag override updated");
        Ok(())
    }

    pub fn user_context(&self) -> Option<UserContext> {
        self.machine.with(IdentityState::user_context)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.machine.with(|state| state.has_role(role))
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        self.machine.with(|state| state.has_any_role(roles))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.machine.with(|state| state.has_permission(permission))
    }

    /// Apply an externally produced event, e.g. flags pushed by the host.
    pub fn dispatch(&self, event: IdentityEvent) {
        self.machine.dispatch(event);
    }

    pub fn state(&self) -> IdentityState {
        self.machine.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.machine.subscribe()
    }

    async fn load_tenant(&self) -> IdentityResult<Tenant> {
        self.machine.dispatch(IdentityEvent::TenantLoading);

        let Some(tenant_id) = self.resolver.resolve_tenant_id() else {
            warn!("No tenant id available");
            self.machine.dispatch(IdentityEvent::TenantUnresolved);
            return Err(IdentityError::Tenant("no tenant id available".to_string()));
        };

        match self.connector.get_tenant(&tenant_id).await {
            Ok(tenant) => {
                debug!(tenant_id = %tenant.id, "Tenant loaded");
                self.machine
                    .dispatch(IdentityEvent::TenantResolved(tenant.clone()));
                Ok(tenant)
            }
            Err(e) => {
                warn!(tenant_id = %tenant_id, error = %e, "Failed to load tenant");
                self.machine.dispatch(IdentityEvent::TenantUnresolved);
                Err(IdentityError::Tenant(format!(
                    "failed to load tenant {}: {}",
                    tenant_id, e
                )))
            }
        }
    }

    /// Resolve the current user from the existing session, if any.
    async fn load_user(&self) -> Option<AuthUser> {
        self.machine.dispatch(IdentityEvent::AuthLoading);

        let access_token = match self.session.get_valid_access_token().await {
            Ok(token) => token,
            Err(AuthError::NotLoggedIn) => {
                debug!("No existing session");
                self.machine
                    .dispatch(IdentityEvent::Unauthenticated { error: None });
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Existing session unusable");
                self.machine.dispatch(IdentityEvent::Unauthenticated {
                    error: Some(e.to_string()),
                });
                return None;
            }
        };

        match self.connector.get_current_user(&access_token).await {
            Ok(user) => {
                debug!(user_id = %user.id, "Current user loaded");
                self.machine
                    .dispatch(IdentityEvent::UserAuthenticated(user.clone()));
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load current user");
                self.machine.dispatch(IdentityEvent::Unauthenticated {
                    error: Some(e.to_string()),
                });
                None
            }
        }
    }

    async fn load_roles(&self, user_id: &str) {
        let roles = match self.connector.get_user_roles(user_id).await {
            Ok(roles) => roles,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load roles, continuing without");
                Vec::new()
            }
        };
        self.machine.dispatch(IdentityEvent::RolesLoaded(roles));
    }

    async fn load_flags(&self, tenant_id: &str) {
        let flags = match self.connector.get_feature_flags(tenant_id).await {
            Ok(flags) => FlagSet::from(flags),
            Err(e) => {
                warn!(tenant_id, error = %e, "Failed to load feature flags, continuing without");
                FlagSet::new()
            }
        };
        self.machine.dispatch(IdentityEvent::FlagsLoaded(flags));
    }

    fn sync_session(&self) {
        let session = self.session.session_state();
        self.machine.dispatch(IdentityEvent::SessionChanged {
            is_valid: session.is_valid,
            is_refreshing: session.is_refreshing,
        });
    }
}
