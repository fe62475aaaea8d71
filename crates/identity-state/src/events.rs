//! Events dispatched into the identity state machine.

use crate::{Role, Tenant};
use feature_flags::FlagSet;
use session_runtime::AuthUser;

/// Pre-supplied state used to skip backend loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InitialState {
    pub tenant: Option<Tenant>,
    pub user: Option<AuthUser>,
    pub roles: Vec<Role>,
    pub flags: FlagSet,
}

impl InitialState {
    /// Hydration applies only when both tenant and user are known.
    pub fn is_complete(&self) -> bool {
        self.tenant.is_some() && self.user.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentityEvent {
    TenantLoading,
    TenantResolved(Tenant),
    TenantUnresolved,
    AuthLoading,
    UserAuthenticated(AuthUser),
    Unauthenticated { error: Option<String> },
    RolesLoaded(Vec<Role>),
    FlagsLoaded(FlagSet),
    FlagOverrideUpdated { key: String, enabled: bool },
    SessionChanged { is_valid: bool, is_refreshing: bool },
    /// A refresh failure ended the session.
    SessionInvalidated { reason: String },
    LoggedOut,
    Hydrated(InitialState),
}
