//! Proactive refresh ahead of expiry.

use crate::{RefreshCoordinator, TokenStore};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Timer that refreshes tokens `margin` before they expire.
///
/// Firing goes through [`RefreshCoordinator::get_valid_access_token`], so a
/// proactive refresh and concurrent reactive callers share one ticket.
/// After each firing the timer re-reads the store and re-arms for the new
/// pair, waiting at least `min_rearm_delay`.
pub struct ProactiveRefreshScheduler {
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<TokenStore>,
    min_rearm_delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ProactiveRefreshScheduler {
    pub fn new(
        coordinator: Arc<RefreshCoordinator>,
        store: Arc<TokenStore>,
        min_rearm_delay: Duration,
    ) -> Self {
        Self {
            coordinator,
            store,
            min_rearm_delay,
            timer: Mutex::new(None),
        }
    }

    /// Cancel any pending timer and arm a new one for the stored tokens.
    ///
    /// Outside a tokio runtime this logs and leaves the scheduler disarmed.
    pub fn arm(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, proactive refresh disabled");
            self.cancel();
            return;
        };

        let coordinator = Arc::clone(&self.coordinator);
        let store = Arc::clone(&self.store);
        let min_rearm_delay = self.min_rearm_delay;

        let handle = runtime.spawn(async move {
            run_timer(coordinator, store, min_rearm_delay).await;
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the pending timer, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
            debug!("Proactive refresh timer cancelled");
        }
    }

    /// True while a timer task is alive.
    pub fn is_armed(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ProactiveRefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_timer(
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<TokenStore>,
    min_rearm_delay: Duration,
) {
    let margin = coordinator.margin();
    let mut fired = false;

    loop {
        let Some(pair) = store.get() else {
            debug!("No tokens, proactive refresh timer stopped");
            return;
        };

        let mut delay = delay_until_refresh(pair.expires_at, store.now(), margin);
        if fired {
            delay = delay.max(min_rearm_delay);
        }

        debug!(
            delay_ms = delay.as_millis() as u64,
            expires_at = %pair.expires_at,
            "Proactive refresh armed"
        );
        tokio::time::sleep(delay).await;
        fired = true;

        if let Err(e) = coordinator.get_valid_access_token().await {
            debug!(error = %e, "Proactive refresh failed, timer stopped");
            return;
        }
    }
}

/// Time from `now` until `expires_at - margin`, zero if already past.
fn delay_until_refresh(
    expires_at: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
    margin: Duration,
) -> Duration {
    let Ok(margin) = chrono::Duration::from_std(margin) else {
        return Duration::ZERO;
    };
    expires_at
        .checked_sub_signed(margin)
        .and_then(|fire_at| (fire_at - now).to_std().ok())
        .unwrap_or(Duration::ZERO)
}
