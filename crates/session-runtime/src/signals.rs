//! Session phase tracking and change notification.
//!
//! Shared by the session manager and the refresh coordinator so both can
//! drive the same state machine without referencing each other.

use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionPhase};
use crate::{AuthError, AuthResult, TokenStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Payload for session state change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStateChanged {
    pub phase: SessionPhase,
    /// Tokens are present and not yet expired.
    pub is_valid: bool,
    pub is_refreshing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Callback type for session state change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionStateChanged) + Send + Sync>;

/// Callback invoked once when a refresh failure ends the session.
pub type InvalidationCallback = Box<dyn Fn(&AuthError) + Send + Sync>;

pub(crate) struct SessionSignals {
    store: Arc<TokenStore>,
    fsm: Mutex<SessionMachine>,
    state_callback: Mutex<Option<Arc<dyn Fn(SessionStateChanged) + Send + Sync>>>,
    invalidation_callback: Mutex<Option<Arc<dyn Fn(&AuthError) + Send + Sync>>>,
}

impl SessionSignals {
    pub(crate) fn new(store: Arc<TokenStore>) -> Self {
        Self {
            store,
            fsm: Mutex::new(SessionMachine::new()),
            state_callback: Mutex::new(None),
            invalidation_callback: Mutex::new(None),
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.fsm.lock().state())
    }

    pub(crate) fn set_state_callback(&self, callback: SessionStateCallback) {
        *self.state_callback.lock() = Some(Arc::from(callback));
    }

    pub(crate) fn set_invalidation_callback(&self, callback: InvalidationCallback) {
        *self.invalidation_callback.lock() = Some(Arc::from(callback));
    }

    /// Transition the FSM and notify the callback if the phase changed.
    pub(crate) fn transition(&self, input: &SessionMachineInput) -> AuthResult<SessionPhase> {
        let mut fsm = self.fsm.lock();
        let old_phase = SessionPhase::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_phase = SessionPhase::from(fsm.state());
        drop(fsm);

        if old_phase != new_phase {
            debug!(
                old_state = ?old_phase,
                new_state = ?new_phase,
                "Session state transition"
            );
            self.notify_state_change(new_phase);
        }

        Ok(new_phase)
    }

    /// Transition, logging instead of failing when the input doesn't apply.
    ///
    /// Used on paths racing with logout or `set_tokens`, where the phase may
    /// already have moved on.
    pub(crate) fn transition_or_skip(&self, input: &SessionMachineInput) {
        if let Err(e) = self.transition(input) {
            debug!(error = %e, "Skipping session transition");
        }
    }

    pub(crate) fn notify_invalidated(&self, error: &AuthError) {
        let callback = self.invalidation_callback.lock().clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    fn notify_state_change(&self, phase: SessionPhase) {
        let callback = self.state_callback.lock().clone();
        if let Some(callback) = callback {
            let tokens = self.store.get();
            let now = self.store.now();
            callback(SessionStateChanged {
                phase,
                is_valid: tokens
                    .as_ref()
                    .is_some_and(|pair| !pair.is_expired_at(now, std::time::Duration::ZERO)),
                is_refreshing: phase == SessionPhase::Refreshing,
                expires_at: tokens.map(|pair| pair.expires_at),
            });
        }
    }
}
