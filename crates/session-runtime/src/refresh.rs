//! Single-flight token refresh.
//!
//! At most one refresh ticket exists at a time. The first caller that finds
//! the token expired creates the ticket and spawns the backend call; every
//! other caller attaches to the ticket's `watch` channel and receives the
//! same outcome. Ticket creation and lookup happen under one mutex that is
//! released before anything awaits.

use crate::session_fsm::SessionMachineInput;
use crate::signals::SessionSignals;
use crate::{AuthError, AuthResult, SessionConnector, TokenGrant, TokenStore};
use identity_config_and_utils::SessionConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Retry behaviour for transient refresh failures.
///
/// Attempts all belong to the same ticket, so waiters still see one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Backend calls per ticket, including the first (1 = no retry).
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshPolicy {
    /// Calculate the delay after a given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

impl From<&SessionConfig> for RefreshPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_attempts: config.refresh_max_attempts.max(1),
            initial_delay_ms: config.refresh_initial_delay_ms,
            max_delay_ms: config.refresh_max_delay_ms,
        }
    }
}

type RefreshOutcome = Option<AuthResult<String>>;

struct RefreshTicket {
    id: u64,
    /// Store generation the ticket refreshes from.
    generation: u64,
    outcome: watch::Receiver<RefreshOutcome>,
}

enum Acquired {
    Valid(String),
    Attached(watch::Receiver<RefreshOutcome>),
    Created(PendingLaunch),
}

/// A ticket registered in the slot whose backend call is not spawned yet.
struct PendingLaunch {
    id: u64,
    generation: u64,
    refresh_token: String,
    sender: watch::Sender<RefreshOutcome>,
    receiver: watch::Receiver<RefreshOutcome>,
}

enum Settled {
    Committed,
    Failed(AuthError),
    Superseded,
}

/// Deduplicates refresh calls across concurrent callers.
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    connector: Arc<dyn SessionConnector>,
    signals: Arc<SessionSignals>,
    policy: RefreshPolicy,
    margin: Duration,
    slot: Mutex<Option<RefreshTicket>>,
    next_ticket: AtomicU64,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        store: Arc<TokenStore>,
        connector: Arc<dyn SessionConnector>,
        signals: Arc<SessionSignals>,
        policy: RefreshPolicy,
        margin: Duration,
    ) -> Self {
        Self {
            store,
            connector,
            signals,
            policy,
            margin,
            slot: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Lead time before expiry at which tokens count as expired.
    pub fn margin(&self) -> Duration {
        self.margin
    }

    pub fn policy(&self) -> &RefreshPolicy {
        &self.policy
    }

    /// True while a refresh ticket is outstanding.
    pub fn is_refreshing(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|ticket| ticket.outcome.has_changed().is_ok())
    }

    /// Return a valid access token, refreshing at most once across all
    /// concurrent callers.
    pub async fn get_valid_access_token(self: &Arc<Self>) -> AuthResult<String> {
        let receiver = match self.acquire()? {
            Acquired::Valid(token) => return Ok(token),
            Acquired::Attached(receiver) => {
                debug!("Attached to in-flight token refresh");
                receiver
            }
            Acquired::Created(launch) => {
                // Enter Refreshing before the task can settle the ticket.
                self.signals
                    .transition_or_skip(&SessionMachineInput::RefreshStarted);
                let receiver = launch.receiver.clone();
                self.launch(launch);
                receiver
            }
        };

        Self::wait(receiver).await
    }

    /// Expiry check, ticket lookup and ticket creation, all under the slot lock.
    fn acquire(&self) -> AuthResult<Acquired> {
        let mut slot = self.slot.lock();

        let (tokens, generation) = self.store.snapshot();
        let Some(pair) = tokens else {
            return Err(AuthError::NotLoggedIn);
        };

        if !pair.is_expired_at(self.store.now(), self.margin) {
            return Ok(Acquired::Valid(pair.access_token));
        }

        if let Some(ticket) = slot.as_ref() {
            // A closed channel means the task died without settling.
            let live = ticket.outcome.has_changed().is_ok();
            if ticket.generation == generation && live {
                return Ok(Acquired::Attached(ticket.outcome.clone()));
            }
            debug!(
                stale_ticket = ticket.id,
                live, "Replacing stale refresh ticket"
            );
        }

        let id = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        *slot = Some(RefreshTicket {
            id,
            generation,
            outcome: receiver.clone(),
        });

        Ok(Acquired::Created(PendingLaunch {
            id,
            generation,
            refresh_token: pair.refresh_token,
            sender,
            receiver,
        }))
    }

    fn launch(self: &Arc<Self>, launch: PendingLaunch) {
        info!(
            ticket = launch.id,
            generation = launch.generation,
            "Starting token refresh"
        );

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator
                .run_ticket(
                    launch.id,
                    launch.generation,
                    launch.refresh_token,
                    launch.sender,
                )
                .await;
        });
    }

    async fn wait(mut receiver: watch::Receiver<RefreshOutcome>) -> AuthResult<String> {
        match receiver.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone().unwrap_or(Err(AuthError::RefreshAborted)),
            Err(_) => Err(AuthError::RefreshAborted),
        }
    }

    async fn run_ticket(
        self: Arc<Self>,
        id: u64,
        generation: u64,
        refresh_token: String,
        sender: watch::Sender<RefreshOutcome>,
    ) {
        let mut guard = UnsettledTicket {
            coordinator: Arc::clone(&self),
            id,
            armed: true,
        };

        let result = self.call_backend(generation, &refresh_token).await;
        let (outcome, settled) = self.settle(generation, result);

        guard.armed = false;
        self.release(id);
        let _ = sender.send(Some(outcome));

        match settled {
            Settled::Committed => {
                self.signals
                    .transition_or_skip(&SessionMachineInput::RefreshSucceeded);
            }
            Settled::Failed(error) => {
                self.signals
                    .transition_or_skip(&SessionMachineInput::RefreshFailed);
                self.signals.notify_invalidated(&error);
            }
            Settled::Superseded => {}
        }
    }

    async fn call_backend(&self, generation: u64, refresh_token: &str) -> AuthResult<TokenGrant> {
        let mut attempt: u32 = 0;
        loop {
            let error = match self.connector.refresh(refresh_token).await {
                Ok(grant) => return Ok(grant),
                Err(e) => AuthError::from(e),
            };
            attempt += 1;

            if !error.is_transient() || attempt >= self.policy.max_attempts {
                return Err(error);
            }
            if self.store.generation() != generation {
                return Err(AuthError::SessionEnded);
            }

            let delay = self.policy.delay_for_attempt(attempt - 1);
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Token refresh failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn settle(&self, generation: u64, result: AuthResult<TokenGrant>) -> (AuthResult<String>, Settled) {
        match result {
            Ok(grant) => match self.store.commit_if_generation(generation, grant) {
                Some(pair) => {
                    info!(expires_at = %pair.expires_at, "Token refresh succeeded");
                    (Ok(pair.access_token), Settled::Committed)
                }
                None => (self.superseded_outcome(), Settled::Superseded),
            },
            Err(error) => {
                if self.store.clear_if_generation(generation) {
                    warn!(error = %error, "Token refresh failed, session invalidated");
                    (Err(error.clone()), Settled::Failed(error))
                } else {
                    (self.superseded_outcome(), Settled::Superseded)
                }
            }
        }
    }

    /// Outcome for waiters of a ticket whose session was replaced or ended.
    fn superseded_outcome(&self) -> AuthResult<String> {
        let now = self.store.now();
        match self.store.get() {
            Some(pair) if !pair.is_expired_at(now, Duration::ZERO) => {
                debug!("Refresh superseded by newer tokens");
                Ok(pair.access_token)
            }
            _ => {
                debug!("Refresh result discarded, session ended");
                Err(AuthError::SessionEnded)
            }
        }
    }

    /// Clear the slot if it still holds ticket `id`.
    fn release(&self, id: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|ticket| ticket.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

/// Leaves the `Refreshing` phase when a refresh task is dropped before it
/// settles (panic or runtime shutdown).
///
/// Waiters still observe the closed channel as `RefreshAborted`; the tokens
/// are left as they were, so the session returns to `LoggedIn`.
struct UnsettledTicket {
    coordinator: Arc<RefreshCoordinator>,
    id: u64,
    armed: bool,
}

impl Drop for UnsettledTicket {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(ticket = self.id, "Token refresh ended without an outcome");
        // A newer ticket owns the phase once this one was replaced.
        if self.coordinator.release(self.id) {
            self.coordinator
                .signals
                .transition_or_skip(&SessionMachineInput::RefreshAborted);
        }
    }
}
