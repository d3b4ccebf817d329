//! # Retry backoff.
//!
//! [`BackoffPolicy`] computes the delay before re-submitting a failed
//! transformation: `2^retry` seconds, capped at a configurable maximum.
//! `retry` counts failed attempts so far, so the first delay (after one
//! failure) is two seconds.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use viewvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::new(Duration::from_secs(60));
//! assert_eq!(backoff.delay(1), Duration::from_secs(2));
//! assert_eq!(backoff.delay(3), Duration::from_secs(8));
//! // 2^7 = 128s, capped at 60s
//! assert_eq!(backoff.delay(7), Duration::from_secs(60));
//! ```

use std::time::Duration;

/// Exponential retry backoff with a cap.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Maximum delay.
    cap: Duration,
}

impl BackoffPolicy {
    /// Creates a policy with the given delay cap.
    pub fn new(cap: Duration) -> Self {
        Self { cap }
    }

    /// Computes the delay after `retry` failed attempts.
    pub fn delay(&self, retry: u32) -> Duration {
        let seconds = match 2u64.checked_pow(retry) {
            Some(s) => s,
            None => return self.cap,
        };
        Duration::from_secs(seconds).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_failed_attempt() {
        let backoff = BackoffPolicy::new(Duration::from_secs(3600));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(8));
        assert_eq!(backoff.delay(5), Duration::from_secs(32));
    }

    #[test]
    fn never_exceeds_the_cap() {
        let backoff = BackoffPolicy::new(Duration::from_secs(10));
        assert_eq!(backoff.delay(4), Duration::from_secs(10));
        assert_eq!(backoff.delay(63), Duration::from_secs(10));
        // 2^64 overflows u64; the cap still holds.
        assert_eq!(backoff.delay(64), Duration::from_secs(10));
    }
}
