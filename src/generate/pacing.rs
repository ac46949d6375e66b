//! Request pacing between generation iterations.
//!
//! [`RequestPacer`] enforces a minimum spacing between the starts of
//! consecutive iterations and an optional longer cooldown after every batch of
//! reservations. All waits go through [`sleep_unless_interrupted`] so a
//! cancellation request takes effect within one poll interval.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//! use std::time::Duration;
//! use hidemail_core::generate::RequestPacer;
//!
//! # async fn example() {
//! let interrupted = AtomicBool::new(false);
//! let mut pacer = RequestPacer::new(Duration::from_millis(500));
//!
//! // First iteration proceeds immediately
//! assert!(pacer.wait_turn(&interrupted).await);
//!
//! // Second iteration waits for the remaining spacing
//! assert!(pacer.wait_turn(&interrupted).await);
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Maximum Retry-After value (1 hour) to prevent excessive delays.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// How often a sleeping run checks the interruption flag.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spacing and cooldown state for one generation run.
#[derive(Debug)]
pub struct RequestPacer {
    min_spacing: Duration,
    cooldown_every: u32,
    cooldown: Duration,
    last_start: Option<Instant>,
    reserved_since_cooldown: u32,
    waited: Duration,
}

impl RequestPacer {
    /// Creates a pacer enforcing `min_spacing` between iteration starts.
    #[must_use]
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            cooldown_every: 0,
            cooldown: Duration::ZERO,
            last_start: None,
            reserved_since_cooldown: 0,
            waited: Duration::ZERO,
        }
    }

    /// Creates a pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Adds a cooldown of `cooldown` after every `every` reservations.
    ///
    /// `every == 0` disables the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, every: u32, cooldown: Duration) -> Self {
        self.cooldown_every = every;
        self.cooldown = cooldown;
        self
    }

    /// Returns the configured minimum spacing.
    #[must_use]
    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Returns the total time spent waiting so far.
    #[must_use]
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Counts a successful reservation toward the next cooldown.
    pub fn record_reserved(&mut self) {
        self.reserved_since_cooldown = self.reserved_since_cooldown.saturating_add(1);
    }

    /// Waits until the next iteration may start.
    ///
    /// The first call never waits. Returns `false` if `interrupted` was set
    /// before or during the wait.
    #[instrument(skip(self, interrupted), fields(min_spacing_ms = self.min_spacing.as_millis()))]
    pub async fn wait_turn(&mut self, interrupted: &AtomicBool) -> bool {
        let mut delay = self
            .last_start
            .map_or(Duration::ZERO, |last| {
                self.min_spacing.saturating_sub(last.elapsed())
            });

        if self.cooldown_every > 0 && self.reserved_since_cooldown >= self.cooldown_every {
            info!(
                reserved = self.reserved_since_cooldown,
                cooldown_secs = self.cooldown.as_secs(),
                "cooling down before next batch"
            );
            delay = delay.max(self.cooldown);
            self.reserved_since_cooldown = 0;
        }

        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis(), "pacing next iteration");
            let started = Instant::now();
            let completed = sleep_unless_interrupted(delay, interrupted).await;
            self.waited += started.elapsed();
            if !completed {
                return false;
            }
        } else if interrupted.load(Ordering::SeqCst) {
            return false;
        }

        self.last_start = Some(Instant::now());
        true
    }
}

/// Sleeps for `delay`, waking early if `interrupted` is set.
///
/// Returns `true` if the full delay elapsed, `false` if interrupted.
pub async fn sleep_unless_interrupted(delay: Duration, interrupted: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if interrupted.load(Ordering::SeqCst) {
            debug!("wait interrupted");
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep((deadline - now).min(INTERRUPT_POLL_INTERVAL)).await;
    }
}

/// Parses a `Retry-After` header value.
///
/// Supports both formats from RFC 7231:
/// - Integer seconds: `"120"`
/// - HTTP-date: `"Wed, 21 Oct 2015 07:28:00 GMT"`
///
/// Values above one hour are capped at one hour.
///
/// # Returns
///
/// - `Some(Duration)` if parsing succeeds
/// - `None` if the value is negative, in the past or malformed
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hidemail_core::generate::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
#[instrument]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }

        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(cap_retry_after(duration));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(datetime) => match datetime.duration_since(std::time::SystemTime::now()) {
            Ok(duration) => Some(cap_retry_after(duration)),
            Err(_) => {
                debug!(header_value, "Retry-After date is in the past");
                None
            }
        },
        Err(_) => {
            debug!(header_value, "unrecognized Retry-After format");
            None
        }
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        return MAX_RETRY_AFTER;
    }
    duration
}
