//! Session state machine using rust-fsm.
//!
//! Tracks the externally visible phase of the session. Token validity is
//! still decided by the [`TokenStore`](crate::TokenStore); the machine only
//! records which operation is in progress.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐  LoginAttempt   ┌─────────────────┐
//! │   NotLoggedIn   │ ──────────────► │    LoggingIn    │
//! └────────┬────────┘ ◄────────────── └────────┬────────┘
//!          │            LoginFailed            │ LoginSuccess / TokensSet
//!          │ TokensSet                         ▼
//!          │                          ┌─────────────────┐
//!          └────────────────────────► │    LoggedIn     │ ◄─┐
//!                                     └────────┬────────┘   │ RefreshSucceeded
//!                                              │            │ RefreshAborted
//!                                              │            │ TokensSet
//!                                RefreshStarted▼            │
//!                                     ┌─────────────────┐   │
//!             NotLoggedIn ◄────────── │   Refreshing    │ ──┘
//!                     RefreshFailed   └─────────────────┘
//!
//! Any state but LoggingOut ── LogoutRequested ──► LoggingOut ── LogoutComplete ──► NotLoggedIn
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(NotLoggedIn)

    NotLoggedIn => {
        LoginAttempt => LoggingIn,
        TokensSet => LoggedIn,
        LogoutRequested => LoggingOut
    },
    LoggingIn => {
        LoginSuccess => LoggedIn,
        LoginFailed => NotLoggedIn,
        TokensSet => LoggedIn,
        LogoutRequested => LoggingOut
    },
    LoggedIn => {
        RefreshStarted => Refreshing,
        TokensSet => LoggedIn,
        LoginAttempt => LoggingIn,
        LogoutRequested => LoggingOut
    },
    Refreshing => {
        RefreshSucceeded => LoggedIn,
        RefreshAborted => LoggedIn,
        RefreshFailed => NotLoggedIn,
        TokensSet => LoggedIn,
        LoginAttempt => LoggingIn,
        LogoutRequested => LoggingOut
    },
    LoggingOut => {
        LogoutComplete => NotLoggedIn
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session phase for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NotLoggedIn,
    LoggingIn,
    LoggedIn,
    /// A refresh call is outstanding.
    Refreshing,
    LoggingOut,
}

impl SessionPhase {
    /// Returns true if the phase carries a session.
    pub fn has_session(&self) -> bool {
        matches!(self, SessionPhase::LoggedIn | SessionPhase::Refreshing)
    }

    /// Returns true if an operation is in progress.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionPhase::LoggingIn | SessionPhase::Refreshing | SessionPhase::LoggingOut
        )
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::NotLoggedIn => SessionPhase::NotLoggedIn,
            SessionMachineState::LoggingIn => SessionPhase::LoggingIn,
            SessionMachineState::LoggedIn => SessionPhase::LoggedIn,
            SessionMachineState::Refreshing => SessionPhase::Refreshing,
            SessionMachineState::LoggingOut => SessionPhase::LoggingOut,
        }
    }
}
