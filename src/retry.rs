use std::thread;
use std::time::Duration;

use crate::logger::Logger;
use crate::manifest::TransferRecord;
use crate::transfer::TransferOutcome;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Bounded retries with a fixed pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `op` receives the 1-based attempt number. The pause after a failure
    /// is a plain thread sleep, so the calling worker keeps its slot while it
    /// waits. The last outcome is returned as-is; exhaustion is not an error.
    pub fn attempt<F>(&self, record: &TransferRecord, logger: &dyn Logger, mut op: F) -> TransferOutcome
    where
        F: FnMut(u32) -> TransferOutcome,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = op(attempt);
            if outcome.succeeded {
                return outcome;
            }
            logger.retry(&record.relative_name, attempt, &outcome.detail);
            if attempt >= attempts {
                logger.error("upload", &record.source_path, &outcome.detail);
                return outcome;
            }
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use std::path::PathBuf;
    use std::time::Instant;

    fn record() -> TransferRecord {
        TransferRecord {
            relative_name: "a.txt".into(),
            source_path: PathBuf::from("a.txt"),
            size: 1,
        }
    }

    #[test]
    fn stops_after_first_success() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut calls = 0;
        let out = policy.attempt(&record(), &NoopLogger, |_| {
            calls += 1;
            TransferOutcome::uploaded()
        });
        assert!(out.succeeded);
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhausts_and_returns_last_failure() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let mut seen = Vec::new();
        let out = policy.attempt(&record(), &NoopLogger, |n| {
            seen.push(n);
            TransferOutcome::failed(format!("attempt {n}"))
        });
        assert!(!out.succeeded);
        assert_eq!(out.detail, "attempt 3");
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn recovers_on_a_later_attempt() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let out = policy.attempt(&record(), &NoopLogger, |n| {
            if n < 2 {
                TransferOutcome::failed("(503) busy")
            } else {
                TransferOutcome::uploaded()
            }
        });
        assert!(out.succeeded);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let mut calls = 0;
        policy.attempt(&record(), &NoopLogger, |_| {
            calls += 1;
            TransferOutcome::failed("nope")
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn sleeps_between_but_not_after_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(30));
        let start = Instant::now();
        policy.attempt(&record(), &NoopLogger, |_| TransferOutcome::failed("x"));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[test]
    fn default_is_three_attempts_ten_seconds() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay, Duration::from_secs(10));
    }
}
