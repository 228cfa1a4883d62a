//! Retry policy for resource fetches.
//!
//! Every failed attempt is classified into a [`FailureType`]; the
//! [`RetryPolicy`] then decides whether to try again and how long to wait
//! first. By default every failure is retried; permanent failures only stop
//! early when [`RetryPolicy::stop_on_permanent`] is set. The total number of
//! attempts never exceeds [`RetryPolicy::max_attempts`].

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::FetchError;

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on retry: timeouts, connection errors, 5xx, 408, 429.
    Transient,
    /// Will not succeed on retry: most 4xx, invalid URLs, TLS failures.
    Permanent,
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after `delay`; `attempt` is the 1-indexed number of the next attempt.
    Retry { delay: Duration, attempt: u32 },
    /// Give up.
    DoNotRetry { reason: String },
}

/// Attempt budget with optional exponential backoff.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// A zero `base_delay` retries immediately, without jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    stop_on_permanent: bool,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            stop_on_permanent: false,
        }
    }

    /// Retries back-to-back with no delay.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::with_base_delay(max_attempts, Duration::ZERO)
    }

    /// Exponential backoff starting at `base_delay`.
    #[must_use]
    pub fn with_base_delay(max_attempts: u32, base_delay: Duration) -> Self {
        Self::new(
            max_attempts,
            base_delay,
            DEFAULT_MAX_DELAY,
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }

    /// Gives up on the first [`FailureType::Permanent`] failure instead of
    /// spending the remaining attempts.
    #[must_use]
    pub fn stop_on_permanent(mut self) -> Self {
        self.stop_on_permanent = true;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Decides whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if self.stop_on_permanent && failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    /// Random jitter, never more than half the base delay.
    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let bound = MAX_JITTER.min(self.base_delay / 2).as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=bound))
    }
}

/// Classifies a fetch error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 408, 429, 5xx | Transient |
/// | other HTTP 4xx | Permanent |
/// | Timeout | Transient |
/// | Network (TLS) | Permanent |
/// | Network (other) | Transient |
/// | `InvalidUrl` | Permanent |
/// | Other | Transient |
#[instrument]
pub fn classify_error(error: &FetchError) -> FailureType {
    match error {
        FetchError::HttpStatus { status, .. } => classify_http_status(*status),
        FetchError::Timeout { .. } | FetchError::Other { .. } => FailureType::Transient,
        FetchError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        FetchError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 | 429 => FailureType::Transient,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts(), 1);
    }

    #[test]
    fn test_immediate_policy_has_zero_delay() {
        let policy = RetryPolicy::immediate(3);
        match policy.should_retry(FailureType::Transient, 1) {
            RetryDecision::Retry { delay, attempt } => {
                assert_eq!(delay, Duration::ZERO);
                assert_eq!(attempt, 2);
            }
            RetryDecision::DoNotRetry { reason } => panic!("unexpected stop: {reason}"),
        }
    }

    #[test]
    fn test_delay_calculation_exponential() {
        let policy = RetryPolicy::with_base_delay(5, Duration::from_millis(100));
        let first = policy.calculate_delay(1);
        assert!(first >= Duration::from_millis(100));
        assert!(first <= Duration::from_millis(150));

        let third = policy.calculate_delay(3);
        assert!(third >= Duration::from_millis(400));
        assert!(third <= Duration::from_millis(450));
    }

    #[test]
    fn test_delay_calculation_respects_max_delay() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        let delay = policy.calculate_delay(6);
        assert!(delay >= Duration::from_secs(5));
        assert!(delay <= Duration::from_millis(5500));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::immediate(3);
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Transient, 2),
            RetryDecision::Retry { .. }
        ));
        match policy.should_retry(FailureType::Transient, 3) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("exhausted")),
            RetryDecision::Retry { .. } => panic!("third attempt must be the last"),
        }
    }

    #[test]
    fn test_should_retry_permanent_by_default() {
        let policy = RetryPolicy::immediate(3);
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 3),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_stop_on_permanent_does_not_retry() {
        let policy = RetryPolicy::immediate(5).stop_on_permanent();
        match policy.should_retry(FailureType::Permanent, 1) {
            RetryDecision::DoNotRetry { reason } => assert!(reason.contains("permanent")),
            RetryDecision::Retry { .. } => panic!("permanent failures must not retry"),
        }
    }

    #[test]
    fn test_classify_http_statuses() {
        let cases = [
            (400, FailureType::Permanent),
            (403, FailureType::Permanent),
            (404, FailureType::Permanent),
            (408, FailureType::Transient),
            (429, FailureType::Transient),
            (500, FailureType::Transient),
            (503, FailureType::Transient),
        ];
        for (status, expected) in cases {
            let error = FetchError::http_status("http://example.com", status);
            assert_eq!(classify_error(&error), expected, "status {status}");
        }
    }

    #[test]
    fn test_classify_timeout_and_invalid_url() {
        assert_eq!(
            classify_error(&FetchError::timeout("http://example.com")),
            FailureType::Transient
        );
        assert_eq!(
            classify_error(&FetchError::invalid_url("ftp:/x")),
            FailureType::Permanent
        );
    }
}
