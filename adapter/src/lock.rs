//! Retry discipline for transient store conditions.
//!
//! A store shared by several processes reports benign races as
//! [`StoreError::NotFound`] (a file replaced or removed mid-read) or
//! [`StoreError::Locked`] (a record held by another writer). Operations wrap
//! their store calls in [`with_retry`], which backs off and tries again
//! instead of surfacing those errors, up to the bounds of a [`RetryPolicy`].

use std::thread;
use std::time::{Duration, Instant};

use chaind_store::StoreError;

use crate::AdapterError;

/// Bounds and pacing for retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Cap for the doubling wait.
    pub max_delay: Duration,
    /// Total tries of an operation, the first included. 0 means unbounded.
    pub max_attempts: u32,
    /// Give up once this much time has passed since the first try.
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    /// Retry forever. Suits a daemon that would rather stall than drop work.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: 0,
            deadline: None,
            ..Self::default()
        }
    }

    /// Retry without waiting, `max_attempts` tries in total.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts,
            deadline: None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(4),
            max_attempts: 20,
            deadline: None,
        }
    }
}

/// Backoff state for one operation.
pub struct StoreLock {
    policy: RetryPolicy,
    delay: Duration,
    tries: u32,
    started: Instant,
}

impl StoreLock {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            delay: policy.base_delay,
            policy,
            tries: 0,
            started: Instant::now(),
        }
    }

    /// Record a failed try of `op` and wait before the next one.
    ///
    /// Fails with [`AdapterError::RetryExhausted`] carrying `error` once the
    /// policy's attempt count or deadline is used up.
    pub fn again(&mut self, op: &'static str, error: StoreError) -> Result<(), AdapterError> {
        self.tries += 1;
        let out_of_attempts = self.policy.max_attempts > 0 && self.tries >= self.policy.max_attempts;
        let out_of_time = self
            .policy
            .deadline
            .is_some_and(|d| self.started.elapsed() + self.delay > d);
        if out_of_attempts || out_of_time {
            tracing::warn!(op, attempts = self.tries, error = %error, "store retries exhausted");
            return Err(AdapterError::RetryExhausted {
                op,
                attempts: self.tries,
                source: error,
            });
        }
        tracing::debug!(
            op,
            attempt = self.tries,
            delay_ms = self.delay.as_millis() as u64,
            error = %error,
            "store busy, will try again"
        );
        thread::sleep(self.delay);
        self.delay = (self.delay * 2).min(self.policy.max_delay);
        Ok(())
    }

    /// Failed tries so far.
    pub fn attempts(&self) -> u32 {
        self.tries
    }
}

/// Run `f` until it succeeds, retrying transient store errors under `policy`.
/// Other errors are returned on first sight.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    op: &'static str,
    mut f: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, AdapterError> {
    let mut lock = StoreLock::new(policy.clone());
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => lock.again(op, e)?,
            Err(e) => return Err(e.into()),
        }
    }
}
