//! Owner of the current identity state.

use crate::{reduce, IdentityEvent, IdentityState};
use tokio::sync::watch;
use tracing::debug;

/// Holds the current [`IdentityState`] and broadcasts every change.
///
/// `dispatch` applies [`reduce`] atomically with respect to other
/// dispatches; subscribers observe the latest state through `watch`.
pub struct IdentityStateMachine {
    sender: watch::Sender<IdentityState>,
}

impl IdentityStateMachine {
    pub fn new() -> Self {
        Self::with_state(IdentityState::default())
    }

    pub fn with_state(state: IdentityState) -> Self {
        let (sender, _) = watch::channel(state);
        Self { sender }
    }

    pub fn dispatch(&self, event: IdentityEvent) {
        debug!(event = event_name(&event), "Identity event");
        self.sender.send_modify(|state| {
            *state = reduce(state, &event);
        });
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> IdentityState {
        self.sender.borrow().clone()
    }

    /// Read the current state without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&IdentityState) -> R) -> R {
        f(&self.sender.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.sender.subscribe()
    }
}

impl Default for IdentityStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn event_name(event: &IdentityEvent) -> &'static str {
    match event {
        IdentityEvent::TenantLoading => "tenant_loading",
        IdentityEvent::TenantResolved(_) => "tenant_resolved",
        IdentityEvent::TenantUnresolved => "tenant_unresolved",
        IdentityEvent::AuthLoading => "auth_loading",
        IdentityEvent::UserAuthenticated(_) => "user_authenticated",
        IdentityEvent::Unauthenticated { .. } => "unauthenticated",
        IdentityEvent::RolesLoaded(_) => "roles_loaded",
        IdentityEvent::FlagsLoaded(_) => "flags_loaded",
        IdentityEvent::FlagOverrideUpdated { .. } => "flag_override_updated",
        IdentityEvent::SessionChanged { .. } => "session_changed",
        IdentityEvent::SessionInvalidated { .. } => "session_invalidated",
        IdentityEvent::LoggedOut => "logged_out",
        IdentityEvent::Hydrated(_) => "hydrated",
    }
}
