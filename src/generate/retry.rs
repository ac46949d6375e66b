//! Retry logic with exponential backoff for provider failures.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types used
//! uniformly around both provider operations.
//!
//! # Overview
//!
//! When a provider call fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Fatal`] - The session was rejected; the run must stop
//! - [`FailureType::RateLimited`] - Provider throttling; exponential backoff or
//!   the provider-advised `Retry-After`
//! - [`FailureType::Transient`] - Network or malformed-response failures; short
//!   fixed backoff
//! - [`FailureType::Consumed`] - The candidate was reserved elsewhere; generate
//!   a new one after the short fixed backoff
//!
//! Every failed call consumes one attempt of the iteration's budget. The
//! [`RetryPolicy`] decides whether another attempt is allowed and how long to
//! wait before it.
//!
//! # Example
//!
//! ```
//! use hidemail_core::generate::{FailureType, RetryDecision, RetryPolicy, classify_error};
//! use hidemail_core::provider::{Operation, ProviderError};
//!
//! let policy = RetryPolicy::default();
//! let error = ProviderError::rate_limited(Operation::Generate, None, "slow down");
//!
//! match policy.should_retry(classify_error(&error), 1, None) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use crate::provider::ProviderError;

/// Default maximum attempts per alias.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for rate-limit backoff.
pub(crate) const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Default maximum rate-limit backoff.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Default fixed delay after transient failures.
pub const DEFAULT_TRANSIENT_BACKOFF: Duration = Duration::from_secs(2);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to rate-limit delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The session is unusable; stop the run.
    Fatal,

    /// Provider throttling, or an ambiguous non-success answer.
    RateLimited,

    /// Network failure or unparseable response.
    Transient,

    /// The candidate was consumed by another call; regenerate.
    Consumed,
}

/// Decision on whether to retry a failed provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry configuration shared by both provider operations.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 5 seconds
/// - `max_delay`: 300 seconds
/// - `backoff_multiplier`: 2.0
/// - `transient_delay`: 2 seconds
/// - `max_jitter`: 500ms
///
/// # Delay Calculation
///
/// ```text
/// rate limited: retry_after, or min(base_delay * multiplier^(attempt-1) + jitter, max_delay)
/// transient / consumed: transient_delay
/// ```
///
/// Rate-limit delays never decrease from one attempt to the next as long as
/// `max_jitter <= base_delay * (multiplier - 1)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of failed calls allowed per iteration.
    max_attempts: u32,

    /// Base delay for the first rate-limit retry.
    base_delay: Duration,

    /// Maximum rate-limit delay.
    max_delay: Duration,

    /// Multiplier applied each attempt.
    backoff_multiplier: f32,

    /// Fixed delay after transient and consumed failures.
    transient_delay: Duration,

    /// Upper bound of the random jitter added to rate-limit delays.
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_BACKOFF,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            transient_delay: DEFAULT_TRANSIENT_BACKOFF,
            max_jitter: MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom backoff settings.
    ///
    /// `max_attempts` is clamped to at least 1.
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
            ..Self::default()
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults otherwise.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Sets the fixed delay used after transient and consumed failures.
    #[must_use]
    pub fn with_transient_delay(mut self, delay: Duration) -> Self {
        self.transient_delay = delay;
        self
    }

    /// Sets the upper bound of the random jitter (zero disables jitter).
    #[must_use]
    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the rate-limit backoff ceiling.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Determines whether to retry after a failed call.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - Number of failed calls so far in this iteration (1-indexed)
    /// * `retry_after` - Provider-advised wait, used for rate limits when present
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(
        &self,
        failure_type: FailureType,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if failure_type == FailureType::Fatal {
            return RetryDecision::DoNotRetry {
                reason: "session rejected - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = match failure_type {
            FailureType::RateLimited => {
                retry_after.unwrap_or_else(|| self.calculate_backoff(attempt))
            }
            FailureType::Transient | FailureType::Consumed | FailureType::Fatal => {
                self.transient_delay
            }
        };

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            using_retry_after = retry_after.is_some(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Calculates the rate-limit delay with exponential growth and jitter.
    ///
    /// Formula: `min(base_delay * multiplier^(attempt-1) + jitter, max_delay)`
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * multiplier.powf(exponent);

        let jittered_ms = delay_ms + self.calculate_jitter().as_millis() as f64;
        let capped_ms = jittered_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64)
    }

    /// Generates random jitter between 0 and `max_jitter`.
    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}

/// Classifies a provider error into a failure type for retry decisions.
///
/// | Error | Type | Rationale |
/// |-------|------|-----------|
/// | Auth | Fatal | Cookie expired or invalid |
/// | ClientBuild | Fatal | No client to retry with |
/// | RateLimited | RateLimited | Provider throttling or ambiguous answer |
/// | AlreadyReserved | Consumed | Candidate gone; generate another |
/// | Protocol | Transient | Response may be well-formed next time |
/// | Transport | Transient | Network may recover |
#[must_use]
pub fn classify_error(error: &ProviderError) -> FailureType {
    match error {
        ProviderError::Auth { .. } | ProviderError::ClientBuild { .. } => FailureType::Fatal,
        ProviderError::RateLimited { .. } => FailureType::RateLimited,
        ProviderError::AlreadyReserved { .. } => FailureType::Consumed,
        ProviderError::Protocol { .. } | ProviderError::Transport { .. } => FailureType::Transient,
    }
}
