//! Aggregate identity state.

use crate::Role;
use crate::Tenant;
use feature_flags::{FlagDecision, FlagDefinition, FlagSet, TenantOverrides, UserContext};
use session_runtime::AuthUser;

/// Authentication axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Uninitialized,
    Loading,
    Authenticated(AuthUser),
    /// Not signed in. Carries the reason when a failure caused it.
    Unauthenticated(Option<String>),
}

/// Tenant axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TenantStatus {
    #[default]
    Uninitialized,
    Loading,
    Resolved(Tenant),
    Unresolved,
}

/// Mirror of the session manager's validity and refresh activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionView {
    pub is_valid: bool,
    pub is_refreshing: bool,
}

/// Everything the identity runtime knows about the current user and tenant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityState {
    pub auth: AuthStatus,
    pub tenant: TenantStatus,
    pub roles: Vec<Role>,
    /// Server-defined flags for the tenant. Never mutated by override updates.
    pub flags: FlagSet,
    pub overrides: TenantOverrides,
    pub session: SessionView,
}

impl IdentityState {
    pub fn user(&self) -> Option<&AuthUser> {
        match &self.auth {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn tenant(&self) -> Option<&Tenant> {
        match &self.tenant {
            TenantStatus::Resolved(tenant) => Some(tenant),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// True while either axis is still loading.
    pub fn is_loading(&self) -> bool {
        matches!(self.auth, AuthStatus::Loading) || matches!(self.tenant, TenantStatus::Loading)
    }

    /// The signed-in user with role names and the union of role permissions.
    pub fn user_context(&self) -> Option<UserContext> {
        let user = self.user()?;
        let mut permissions: Vec<String> = Vec::new();
        for permission in self.roles.iter().flat_map(|role| role.permissions.iter()) {
            if !permissions.contains(permission) {
                permissions.push(permission.clone());
            }
        }
        Some(
            UserContext::new(user.id.clone())
                .with_roles(self.roles.iter().map(|role| role.name.clone()))
                .with_permissions(permissions),
        )
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.is_authenticated() && self.roles.iter().any(|r| r.name == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_authenticated()
            && self
                .roles
                .iter()
                .any(|role| role.permissions.iter().any(|p| p == permission))
    }

    pub fn get_flag(&self, key: &str) -> Option<&FlagDefinition> {
        self.flags.get(key)
    }

    pub fn evaluate_flag(&self, key: &str) -> Option<FlagDecision> {
        self.flags
            .evaluate(key, &self.overrides, self.user_context().as_ref())
    }

    /// Unknown flags are off.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.evaluate_flag(key)
            .map(|decision| decision.enabled)
            .unwrap_or(false)
    }

    /// The flag exists, is admin-editable, and is not killed server-side.
    pub fn can_edit(&self, key: &str) -> bool {
        self.get_flag(key)
            .is_some_and(|flag| flag.admin_editable && flag.server_enabled)
    }
}
