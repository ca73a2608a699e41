//! Wall-clock sources used for token expiry comparisons.
//!
//! Token expiry is expressed in Unix seconds, so every comparison needs a
//! wall clock. The monitor takes its clock as a trait object so tests can
//! control time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Source of the current time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now_millis)),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Wall time anchored at construction and advanced by the tokio timer.
///
/// Under `tokio::time::pause` this clock moves in lockstep with the
/// runtime's virtual time, which keeps interval-driven code and expiry
/// arithmetic consistent with each other.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor_millis: i64,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(anchor_millis: i64) -> Self {
        Self {
            anchor_millis,
            anchor: tokio::time::Instant::now(),
        }
    }

    /// Anchor at the current system time.
    pub fn from_system() -> Self {
        Self::new(SystemClock.now_millis())
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> i64 {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.anchor);
        self.anchor_millis + elapsed.as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);

        clock.advance_millis(250);
        assert_eq!(clock.now_millis(), 1_250);

        clock.set(42);
        assert_eq!(clock.now_millis(), 42);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let other = clock.clone();
        clock.advance_millis(5);
        assert_eq!(other.now_millis(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::new(10_000);
        assert_eq!(clock.now_millis(), 10_000);

        tokio::time::advance(std::time::Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_millis(), 11_500);
    }
}
