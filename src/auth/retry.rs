//! Retry policy for sign-in attempts.
//!
//! Only transient failures ([`ErrorDisposition::Transient`]) are retried, with
//! a fixed delay between attempts. Credential, verification-code and lock
//! failures surface immediately.
//!
//! ```
//! use std::time::Duration;
//! use ipafetch_core::auth::{AuthRetryPolicy, RetryDecision};
//! use ipafetch_core::store::StoreError;
//!
//! let policy = AuthRetryPolicy::new(2, Duration::from_secs(1));
//! let error = StoreError::invalid_response("truncated body");
//! assert!(matches!(policy.should_retry(&error, 1), RetryDecision::Retry { attempt: 2, .. }));
//! assert!(matches!(policy.should_retry(&error, 2), RetryDecision::DoNotRetry { .. }));
//! ```

use std::time::Duration;

use tracing::debug;

use crate::store::{ErrorDisposition, StoreError};

/// Default number of sign-in attempts, including the first.
pub const DEFAULT_AUTH_MAX_ATTEMPTS: u32 = 2;

/// Default delay between sign-in attempts.
pub const DEFAULT_AUTH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Decision on whether to retry a failed sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after `delay`; `attempt` is the 1-indexed number of the next try.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt the retry will be.
        attempt: u32,
    },
    /// Surface the error.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Bounded, fixed-delay retry policy for sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for AuthRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_MAX_ATTEMPTS, DEFAULT_AUTH_RETRY_DELAY)
    }
}

impl AuthRetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Decides whether attempt number `attempt` (1-indexed) should be retried.
    #[must_use]
    pub fn should_retry(&self, error: &StoreError, attempt: u32) -> RetryDecision {
        let decision = match error.disposition() {
            ErrorDisposition::Transient if attempt < self.max_attempts => RetryDecision::Retry {
                delay: self.delay,
                attempt: attempt + 1,
            },
            ErrorDisposition::Transient => RetryDecision::DoNotRetry {
                reason: format!("giving up after {attempt} attempts"),
            },
            ErrorDisposition::NeedsCode => RetryDecision::DoNotRetry {
                reason: "verification code required".to_string(),
            },
            ErrorDisposition::NeedsReauthentication => RetryDecision::DoNotRetry {
                reason: "credentials rejected".to_string(),
            },
            ErrorDisposition::Terminal => RetryDecision::DoNotRetry {
                reason: format!("non-retryable failure: {error}"),
            },
        };
        debug!(attempt, ?decision, "sign-in retry decision");
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_values() {
        let policy = AuthRetryPolicy::default();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = AuthRetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert!(matches!(
            policy.should_retry(&StoreError::invalid_response("x"), 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_transient_retried_until_bound() {
        let policy = AuthRetryPolicy::new(3, Duration::from_millis(10));
        let error = StoreError::invalid_response("garbage");
        assert_eq!(
            policy.should_retry(&error, 1),
            RetryDecision::Retry {
                delay: Duration::from_millis(10),
                attempt: 2
            }
        );
        assert!(matches!(
            policy.should_retry(&error, 2),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        assert!(matches!(
            policy.should_retry(&error, 3),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_lock_and_credentials_never_retried() {
        let policy = AuthRetryPolicy::new(5, Duration::ZERO);
        for error in [
            StoreError::LockedAccount,
            StoreError::InvalidCredentials,
            StoreError::CodeRequired,
            StoreError::AuthenticationFailed,
        ] {
            assert!(
                matches!(
                    policy.should_retry(&error, 1),
                    RetryDecision::DoNotRetry { .. }
                ),
                "{error:?} must not be retried"
            );
        }
    }
}
