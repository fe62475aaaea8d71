//! Time sources for expiry arithmetic.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use tokio::time::Instant;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall time derived from tokio's monotonic clock.
///
/// Anchored to the wall clock once at construction and advanced by
/// `tokio::time::Instant`, so it follows paused and advanced time in tests
/// and never jumps backwards when the system clock is adjusted.
#[derive(Debug, Clone)]
pub struct TokioClock {
    wall_anchor: DateTime<Utc>,
    instant_anchor: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            wall_anchor: Utc::now(),
            instant_anchor: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.instant_anchor);
        chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|delta| self.wall_anchor.checked_add_signed(delta))
            .unwrap_or(self.wall_anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let start = clock.now();

        tokio::time::advance(Duration::from_secs(90)).await;

        assert_eq!((clock.now() - start).num_seconds(), 90);
    }

    #[test]
    fn test_system_clock_is_close_to_utc_now() {
        let drift = (SystemClock.now() - Utc::now()).num_seconds().abs();
        assert!(drift < 5);
    }
}
