//! Pure state transitions.

use crate::{AuthStatus, IdentityEvent, IdentityState, SessionView, TenantStatus};
use feature_flags::{FlagSet, TenantOverrides};

/// Apply one event to a state, returning the next state.
///
/// Pure: no I/O, no clocks, same input always yields the same output.
pub fn reduce(state: &IdentityState, event: &IdentityEvent) -> IdentityState {
    let mut next = state.clone();

    match event {
        IdentityEvent::TenantLoading => {
            next.tenant = TenantStatus::Loading;
        }
        IdentityEvent::TenantResolved(tenant) => {
            next.overrides = tenant.flag_overrides.clone();
            next.tenant = TenantStatus::Resolved(tenant.clone());
        }
        IdentityEvent::TenantUnresolved => {
            next.tenant = TenantStatus::Unresolved;
            next.flags = FlagSet::new();
            next.overrides = TenantOverrides::new();
        }
        IdentityEvent::AuthLoading => {
            next.auth = AuthStatus::Loading;
        }
        IdentityEvent::UserAuthenticated(user) => {
            next.auth = AuthStatus::Authenticated(user.clone());
        }
        IdentityEvent::Unauthenticated { error } => {
            next.auth = AuthStatus::Unauthenticated(error.clone());
            next.roles.clear();
        }
        IdentityEvent::RolesLoaded(roles) => {
            next.roles = roles.clone();
        }
        IdentityEvent::FlagsLoaded(flags) => {
            next.flags = flags.clone();
        }
        IdentityEvent::FlagOverrideUpdated { key, enabled } => {
            next.overrides.set(key.clone(), *enabled);
        }
        IdentityEvent::SessionChanged {
            is_valid,
            is_refreshing,
        } => {
            next.session = SessionView {
                is_valid: *is_valid,
                is_refreshing: *is_refreshing,
            };
        }
        IdentityEvent::SessionInvalidated { reason } => {
            next.auth = AuthStatus::Unauthenticated(Some(reason.clone()));
            next.roles.clear();
            next.session = SessionView::default();
        }
        IdentityEvent::LoggedOut => {
            next.auth = AuthStatus::Unauthenticated(None);
            next.roles.clear();
            next.session = SessionView::default();
        }
        IdentityEvent::Hydrated(initial) => {
            if let Some(tenant) = &initial.tenant {
                next.overrides = tenant.flag_overrides.clone();
                next.tenant = TenantStatus::Resolved(tenant.clone());
            }
            next.auth = match &initial.user {
                Some(user) => AuthStatus::Authenticated(user.clone()),
                None => AuthStatus::Unauthenticated(None),
            };
            next.roles = initial.roles.clone();
            next.flags = initial.flags.clone();
        }
    }

    next
}
