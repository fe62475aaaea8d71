//! Tenant, user, role and feature-flag state on top of the session runtime.
//!
//! State changes go through a pure [`reduce`] function. The
//! [`IdentityStateMachine`] owns the current state and broadcasts it; the
//! [`IdentityRuntime`] loads data from the backend and keeps the state in
//! step with the session.

mod connector;
mod error;
mod events;
mod machine;
mod reducer;
mod runtime;
mod state;

#[cfg(test)]
mod tests;

pub use connector::{IdentityConnector, Role, StaticTenantResolver, Tenant, TenantResolver};
pub use error::{IdentityError, IdentityResult};
pub use events::{IdentityEvent, InitialState};
pub use machine::IdentityStateMachine;
pub use reducer::reduce;
pub use runtime::IdentityRuntime;
pub use state::{AuthStatus, IdentityState, SessionView, TenantStatus};
