//! Client-side identity session runtime.
//!
//! This crate provides:
//! - Token storage with expiry arithmetic and a generation guard
//! - Single-flight token refresh shared by all concurrent callers
//! - Proactive refresh ahead of expiry
//! - Explicit FSM-based session phase tracking
//! - The [`IdentitySessionManager`] orchestrating all of the above

mod clock;
mod connector;
mod error;
mod refresh;
mod scheduler;
mod session;
mod session_fsm;
mod signals;
mod token_store;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock, TokioClock};
pub use connector::{AuthUser, Credentials, LoginOutcome, SessionConnector};
pub use error::{AuthError, AuthResult, ConnectorError};
pub use refresh::{RefreshCoordinator, RefreshPolicy};
pub use scheduler::ProactiveRefreshScheduler;
pub use session::{AuthHeaders, IdentitySessionManager, SessionOptions, SessionState};
pub use session_fsm::session_machine;
pub use session_fsm::{SessionMachine, SessionMachineInput, SessionMachineState, SessionPhase};
pub use signals::{InvalidationCallback, SessionStateCallback, SessionStateChanged};
pub use token_store::{TokenGrant, TokenLifetime, TokenPair, TokenStore, DEFAULT_TOKEN_TYPE};
