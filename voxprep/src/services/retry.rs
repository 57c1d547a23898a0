//! Typed retry policy for the replace step
//!
//! Two independent pieces:
//! - [`Backoff`]: delay before retry `n` is `min(unit * 2^n, cap)`.
//! - a classifier: the set of [`ErrorClass`]es treated as transient.
//!
//! With the defaults (unit 1s, cap 5s, 10 attempts) the waits after failures
//! 1..=9 are 2s, 4s, 5s, 5s, ... and the 10th failure is terminal.

use std::collections::HashSet;
use std::io;
use std::str::FromStr;
use std::time::Duration;

/// Coarse classification of an I/O error raised by the replace step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    PermissionDenied,
    /// File or resource held by another process (EBUSY, sharing/lock violation)
    Busy,
    WouldBlock,
    Interrupted,
    /// Anything else
    Other,
}

// EBUSY, ETXTBSY
#[cfg(unix)]
const BUSY_OS_CODES: &[i32] = &[16, 26];
// ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
#[cfg(windows)]
const BUSY_OS_CODES: &[i32] = &[32, 33];
#[cfg(not(any(unix, windows)))]
const BUSY_OS_CODES: &[i32] = &[];

impl ErrorClass {
    pub fn of(err: &io::Error) -> Self {
        if let Some(code) = err.raw_os_error() {
            if BUSY_OS_CODES.contains(&code) {
                return ErrorClass::Busy;
            }
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => ErrorClass::PermissionDenied,
            io::ErrorKind::WouldBlock => ErrorClass::WouldBlock,
            io::ErrorKind::Interrupted => ErrorClass::Interrupted,
            _ => ErrorClass::Other,
        }
    }
}

impl FromStr for ErrorClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "permission_denied" => Ok(ErrorClass::PermissionDenied),
            "busy" => Ok(ErrorClass::Busy),
            "would_block" => Ok(ErrorClass::WouldBlock),
            "interrupted" => Ok(ErrorClass::Interrupted),
            "other" => Ok(ErrorClass::Other),
            other => Err(format!("unknown error class '{}'", other)),
        }
    }
}

/// Capped exponential backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub unit: Duration,
    pub cap: Duration,
}

impl Backoff {
    /// Delay to wait after the `attempt`-th failure (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        // 2^31 units already exceeds any sane cap
        let factor = 2u32.saturating_pow(attempt.min(31));
        self.unit.saturating_mul(factor).min(self.cap)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            cap: Duration::from_secs(5),
        }
    }
}

/// Bounded retry policy: attempt budget, schedule and transient-error predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    retryable: HashSet<ErrorClass>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff, retryable: impl IntoIterator<Item = ErrorClass>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            retryable: retryable.into_iter().collect(),
        }
    }

    /// Error classes the default policy retries
    ///
    /// Every OS-level error counts as transient, matching how lock contention
    /// surfaces on different platforms.
    pub fn default_retryable() -> Vec<ErrorClass> {
        vec![
            ErrorClass::PermissionDenied,
            ErrorClass::Busy,
            ErrorClass::WouldBlock,
            ErrorClass::Interrupted,
            ErrorClass::Other,
        ]
    }

    pub fn is_retryable(&self, err: &io::Error) -> bool {
        self.retryable.contains(&ErrorClass::of(err))
    }

    /// Wait before the next attempt, or `None` when `attempt` was the last one
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.backoff.delay(attempt))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Backoff::default(), Self::default_retryable())
    }
}
