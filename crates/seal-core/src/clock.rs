//! Time source abstraction.
//!
//! Proof freshness and subscription validity are both decided against
//! "now", so every component takes its clock as a collaborator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Provides the current Unix timestamp in seconds.
pub trait TimeProvider: Send + Sync {
    fn now_unix(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub const fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to
/// each custodian and advance them all at once.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(initial: u64) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(initial)),
        }
    }

    pub fn set(&self, timestamp: u64) {
        self.current.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.current.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1_704_067_200) // 2024-01-01 00:00:00 UTC
    }
}

impl TimeProvider for ManualClock {
    fn now_unix(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_reasonable() {
        let now = SystemClock::new().now_unix();
        assert!(now > 1_577_836_800, "after 2020");
        assert!(now < 4_102_444_800, "before 2100");
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(1000);
        assert_eq!(clock.now_unix(), 1000);
        clock.advance(500);
        assert_eq!(clock.now_unix(), 1500);
        clock.set(10);
        assert_eq!(clock.now_unix(), 10);
    }

    #[test]
    fn test_manual_clock_clones_share_state() {
        let a = ManualClock::new(0);
        let b = a.clone();
        a.advance(3600);
        assert_eq!(b.now_unix(), 3600);
    }
}
