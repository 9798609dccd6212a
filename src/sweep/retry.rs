//! Bounded retry for telemetry reads.
//!
//! A single primitive serves every retried read so the first attempt and the
//! retry cannot drift apart. Between attempts the operation gets a chance to
//! restore the conditions the read depends on (see [`Recoverable::recover`]),
//! then the policy's backoff delay is waited out.

use crate::error::{AppResult, ProtocolError};
use crate::timing::{Settle, RETRY_SETTLE};
use log::warn;
use std::time::Duration;

/// Defines a policy for retrying an operation.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// The delay after recovery, before the next attempt.
    pub backoff_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_delay: RETRY_SETTLE,
        }
    }
}

/// An operation that can fail transiently and be attempted again.
pub trait Recoverable {
    type Output;

    /// One attempt. Protocol failures are retried.
    fn attempt(&mut self) -> Result<Self::Output, ProtocolError>;

    /// Runs between a failed attempt and the next one. A failure here is not
    /// retried.
    fn recover(&mut self) -> AppResult<()>;

    /// Short description used in diagnostics.
    fn label(&self) -> String;
}

/// Attempt `operation` up to `policy.max_attempts` times.
///
/// Fails with [`ProtocolError::Exhausted`] carrying the last attempt's error
/// once every attempt failed, or with the recovery error if recovery fails.
pub fn retry_bounded<R: Recoverable + ?Sized>(
    operation: &mut R,
    policy: &RetryPolicy,
    settle: &mut dyn Settle,
) -> AppResult<R::Output> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match operation.attempt() {
            Ok(output) => return Ok(output),
            Err(err) => err,
        };
        if attempt >= max_attempts {
            return Err(ProtocolError::Exhausted {
                operation: operation.label(),
                attempts: attempt,
                last: Box::new(err),
            }
            .into());
        }
        warn!(
            "{}: attempt {}/{} failed ({}), retrying",
            operation.label(),
            attempt,
            max_attempts,
            err
        );
        operation.recover()?;
        settle.settle(policy.backoff_delay);
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::timing::RecordingSettle;

    struct MockRecoverable {
        attempts: u32,
        recoveries: u32,
        succeed_on_attempt: u32,
    }

    impl MockRecoverable {
        fn new(succeed_on_attempt: u32) -> Self {
            Self {
                attempts: 0,
                recoveries: 0,
                succeed_on_attempt,
            }
        }
    }

    impl Recoverable for MockRecoverable {
        type Output = u32;

        fn attempt(&mut self) -> Result<u32, ProtocolError> {
            self.attempts += 1;
            if self.attempts >= self.succeed_on_attempt {
                Ok(self.attempts)
            } else {
                Err(ProtocolError::Malformed {
                    line: "{\"curr".to_string(),
                    reason: "EOF while parsing".to_string(),
                })
            }
        }

        fn recover(&mut self) -> AppResult<()> {
            self.recoveries += 1;
            Ok(())
        }

        fn label(&self) -> String {
            "mock read".to_string()
        }
    }

    #[test]
    fn test_retry_logic_succeeds() {
        let mut op = MockRecoverable::new(2);
        let settle = RecordingSettle::new();
        let result = retry_bounded(&mut op, &RetryPolicy::default(), &mut settle.clone());
        assert_eq!(result.unwrap(), 2);
        assert_eq!(op.recoveries, 1);
        assert_eq!(settle.delays(), vec![RETRY_SETTLE]);
    }

    #[test]
    fn test_first_attempt_success_needs_no_recovery() {
        let mut op = MockRecoverable::new(1);
        let settle = RecordingSettle::new();
        retry_bounded(&mut op, &RetryPolicy::default(), &mut settle.clone()).unwrap();
        assert_eq!(op.recoveries, 0);
        assert!(settle.delays().is_empty());
    }

    #[test]
    fn test_retry_logic_fails() {
        let mut op = MockRecoverable::new(3);
        let result = retry_bounded(&mut op, &RetryPolicy::default(), &mut RecordingSettle::new());
        match result {
            Err(BenchError::Protocol(ProtocolError::Exhausted { attempts, last, .. })) => {
                assert_eq!(attempts, 2);
                assert!(matches!(*last, ProtocolError::Malformed { .. }));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(op.attempts, 2);
        assert_eq!(op.recoveries, 1);
    }

    #[test]
    fn test_custom_attempt_count() {
        let mut op = MockRecoverable::new(4);
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_delay: Duration::from_millis(10),
        };
        let settle = RecordingSettle::new();
        assert_eq!(retry_bounded(&mut op, &policy, &mut settle.clone()).unwrap(), 4);
        assert_eq!(settle.delays().len(), 3);
    }

    #[test]
    fn test_failed_recovery_is_not_retried() {
        struct BrokenRecovery(u32);

        impl Recoverable for BrokenRecovery {
            type Output = ();

            fn attempt(&mut self) -> Result<(), ProtocolError> {
                self.0 += 1;
                Err(ProtocolError::Encoding)
            }

            fn recover(&mut self) -> AppResult<()> {
                Err(BenchError::Report("link lost".to_string()))
            }

            fn label(&self) -> String {
                "broken".to_string()
            }
        }

        let mut op = BrokenRecovery(0);
        let result = retry_bounded(&mut op, &RetryPolicy::default(), &mut RecordingSettle::new());
        assert!(matches!(result, Err(BenchError::Report(_))));
        assert_eq!(op.0, 1);
    }
}
