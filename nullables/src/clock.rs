//! Nullable clock: record timestamps under test control.

use chaind_types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Seconds since epoch, moved only by the test.
///
/// Starts at 1000 by default so that "older than N seconds" checks have
/// room below the current time.
#[derive(Debug)]
pub struct NullClock(AtomicU64);

impl NullClock {
    pub fn at(start: Timestamp) -> Self {
        Self(AtomicU64::new(start.as_secs()))
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.0.load(Ordering::SeqCst))
    }

    /// Move forward by `secs`; returns the new time.
    pub fn advance(&self, secs: u64) -> Timestamp {
        Timestamp::new(self.0.fetch_add(secs, Ordering::SeqCst) + secs)
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now.as_secs(), Ordering::SeqCst);
    }
}

impl Default for NullClock {
    fn default() -> Self {
        Self::at(Timestamp::new(1_000))
    }
}
