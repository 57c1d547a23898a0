//! Minimum-delay throttle for external invocations
//!
//! Shared by all synthesis workers. A caller holds a [`Permit`] for the whole
//! invocation; the next caller starts no earlier than `min_interval` after
//! the previous permit was dropped. A zero interval hands out permits
//! without serializing callers.

use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cooperative rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    last_finish: Mutex<Option<Instant>>,
    min_interval: Duration,
}

/// Exclusive slot for one invocation; records the finish time on drop
#[derive(Debug)]
pub struct Permit<'a> {
    slot: Option<MutexGuard<'a, Option<Instant>>>,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Some(last_finish) = self.slot.as_mut() {
            **last_finish = Some(Instant::now());
        }
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_finish: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the slot and for `min_interval` since the previous call ended
    ///
    /// Returns `None` when `cancel` fired while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<Permit<'_>> {
        if self.min_interval.is_zero() {
            return Some(Permit { slot: None });
        }

        let last = tokio::select! {
            guard = self.last_finish.lock() => guard,
            _ = cancel.cancelled() => return None,
        };

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::select! {
                    _ = tokio::time::sleep(wait_time) => {}
                    _ = cancel.cancelled() => return None,
                }
            }
        }

        Some(Permit { slot: Some(last) })
    }
}
