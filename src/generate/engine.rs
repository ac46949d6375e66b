//! The generation loop: generate, reserve, record, pace, repeat.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use super::pacing::{RequestPacer, sleep_unless_interrupted};
use super::retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, DEFAULT_TRANSIENT_BACKOFF,
    FailureType, RetryDecision, RetryPolicy, classify_error,
};
use super::{GenerationError, ResultSink};
use crate::alias::{AliasRecord, AliasStatus};
use crate::provider::{AliasProvider, ProviderError};

/// Default number of aliases requested per run.
pub const DEFAULT_REQUESTED_COUNT: usize = 5;

/// Default minimum spacing between iteration starts.
pub const DEFAULT_DELAY_BETWEEN_REQUESTS: Duration = Duration::from_millis(1500);

/// Default pause length once `cooldown_every` aliases were reserved.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30 * 60);

/// Backoff multiplier used for rate-limit retries.
const RATE_LIMIT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// How one run is bounded and paced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunBudget {
    /// Number of iterations to run.
    pub requested_count: usize,
    /// Failed provider calls allowed per iteration (at least 1).
    pub max_attempts_per_alias: u32,
    /// Minimum spacing between iteration starts.
    pub delay_between_requests: Duration,
    /// Ceiling for exponential rate-limit backoff.
    pub max_backoff: Duration,
    /// Fixed wait after transient failures.
    pub transient_backoff: Duration,
    /// Cool down after this many reservations (0 disables).
    pub cooldown_every: u32,
    /// Cooldown length.
    pub cooldown: Duration,
}

impl Default for RunBudget {
    fn default() -> Self {
        Self {
            requested_count: DEFAULT_REQUESTED_COUNT,
            max_attempts_per_alias: DEFAULT_MAX_ATTEMPTS,
            delay_between_requests: DEFAULT_DELAY_BETWEEN_REQUESTS,
            max_backoff: DEFAULT_MAX_BACKOFF,
            transient_backoff: DEFAULT_TRANSIENT_BACKOFF,
            cooldown_every: 0,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

impl RunBudget {
    /// Creates a budget for `requested_count` aliases with default pacing.
    #[must_use]
    pub fn new(requested_count: usize) -> Self {
        Self {
            requested_count,
            ..Self::default()
        }
    }

    /// Builds the retry policy this budget implies.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts_per_alias,
            DEFAULT_BASE_DELAY.min(self.max_backoff),
            self.max_backoff,
            RATE_LIMIT_BACKOFF_MULTIPLIER,
        )
        .with_transient_delay(self.transient_backoff)
    }

    /// Builds the pacer this budget implies.
    #[must_use]
    pub fn pacer(&self) -> RequestPacer {
        RequestPacer::new(self.delay_between_requests)
            .with_cooldown(self.cooldown_every, self.cooldown)
    }
}

/// Lifecycle of one iteration.
///
/// ```text
/// Pending -> Generating -> (Generated | GenFailed)
/// Generated -> Reserving -> (Reserved | ReserveFailed | RetryGenerating)
/// RetryGenerating -> Generating
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationState {
    /// Not started.
    Pending,
    /// Waiting on `generate_candidate`.
    Generating,
    /// Holding a candidate.
    Generated,
    /// Attempts exhausted without a candidate.
    GenFailed,
    /// Waiting on `reserve`.
    Reserving,
    /// Reserved and handed to the sink.
    Reserved,
    /// Attempts exhausted while reserving.
    ReserveFailed,
    /// Candidate was taken; generating a new one.
    RetryGenerating,
}

impl IterationState {
    /// Returns true for states that end an iteration.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reserved | Self::GenFailed | Self::ReserveFailed)
    }
}

/// Final result of one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The alias was reserved and recorded.
    Reserved {
        /// The recorded alias.
        record: AliasRecord,
        /// Failed calls before success.
        retries: u32,
    },
    /// No candidate could be generated.
    GenFailed {
        /// Failed calls made.
        attempts: u32,
        /// Last failure.
        reason: String,
    },
    /// A candidate was generated but could not be reserved.
    ReserveFailed {
        /// The abandoned candidate, with [`AliasStatus::Failed`].
        record: AliasRecord,
        /// Failed calls made.
        attempts: u32,
        /// Last failure.
        reason: String,
    },
}

impl IterationOutcome {
    /// Terminal state this outcome corresponds to.
    #[must_use]
    pub fn state(&self) -> IterationState {
        match self {
            Self::Reserved { .. } => IterationState::Reserved,
            Self::GenFailed { .. } => IterationState::GenFailed,
            Self::ReserveFailed { .. } => IterationState::ReserveFailed,
        }
    }

    /// Returns the reserved record, if any.
    #[must_use]
    pub fn reserved_record(&self) -> Option<&AliasRecord> {
        match self {
            Self::Reserved { record, .. } => Some(record),
            Self::GenFailed { .. } | Self::ReserveFailed { .. } => None,
        }
    }

    /// Returns the failure reason, if the iteration failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Reserved { .. } => None,
            Self::GenFailed { reason, .. } | Self::ReserveFailed { reason, .. } => Some(reason),
        }
    }
}

/// Live counters for a run, readable while it is in progress.
#[derive(Debug, Default)]
pub struct RunStats {
    reserved: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
}

impl RunStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of reserved aliases.
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::SeqCst)
    }

    /// Returns the number of failed iterations.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of finished iterations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.reserved() + self.failed()
    }

    /// Returns the number of retries made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    fn increment_reserved(&self) {
        self.reserved.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}

/// Summary of a finished (or interrupted) run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Number of iterations requested.
    pub requested: usize,
    /// One outcome per finished iteration, in order.
    pub outcomes: Vec<IterationOutcome>,
    /// Whether the run stopped on a cancellation request.
    pub interrupted: bool,
    /// Retries across all iterations.
    pub retried: usize,
    /// Time spent in pacing and backoff waits.
    pub waited: Duration,
}

impl RunReport {
    /// Number of reserved aliases.
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.records().count()
    }

    /// Number of failed iterations.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.reserved()
    }

    /// Reserved records, in order.
    pub fn records(&self) -> impl Iterator<Item = &AliasRecord> {
        self.outcomes
            .iter()
            .filter_map(IterationOutcome::reserved_record)
    }

    /// Failure reasons, in order.
    pub fn failures(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter_map(IterationOutcome::failure_reason)
    }
}

/// What to do after a failed provider call.
enum Recovery {
    Retry,
    Exhausted(String),
    Interrupted,
    Fatal(ProviderError),
}

/// Result of one iteration as seen by the run loop.
enum Step {
    Done(IterationOutcome),
    Interrupted,
    Fatal(ProviderError),
}

/// Sequential alias generation with retry, pacing and cancellation.
///
/// One provider request is in flight at a time. Every reserved alias is handed
/// to the [`ResultSink`] before the next iteration starts.
///
/// # Example
///
/// ```no_run
/// use hidemail_core::auth::Session;
/// use hidemail_core::generate::{CollectingSink, GenerationLoop, RunBudget};
/// use hidemail_core::provider::{DEFAULT_BASE_URL, HttpSessionClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::from_cookie("X-APPLE-WEBAUTH-USER=\"v=1:d=1\"", DEFAULT_BASE_URL)?;
/// let client = HttpSessionClient::new(session)?;
/// let mut sink = CollectingSink::new();
///
/// let report = GenerationLoop::new(RunBudget::new(3))
///     .run(&client, "newsletters", &mut sink)
///     .await?;
/// println!("{} reserved, {} failed", report.reserved(), report.failed());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GenerationLoop {
    budget: RunBudget,
    retry_policy: RetryPolicy,
}

impl GenerationLoop {
    /// Creates a loop whose retry policy is derived from `budget`.
    #[must_use]
    pub fn new(budget: RunBudget) -> Self {
        let retry_policy = budget.retry_policy();
        Self {
            budget,
            retry_policy,
        }
    }

    /// Replaces the retry policy derived from the budget.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the run budget.
    #[must_use]
    pub fn budget(&self) -> &RunBudget {
        &self.budget
    }

    /// Runs to completion with no way to cancel.
    ///
    /// # Errors
    ///
    /// See [`run_with`](Self::run_with).
    pub async fn run<P, S>(
        &self,
        provider: &P,
        label: &str,
        sink: &mut S,
    ) -> Result<RunReport, GenerationError>
    where
        P: AliasProvider + ?Sized,
        S: ResultSink + ?Sized,
    {
        let never = AtomicBool::new(false);
        self.run_with(provider, label, sink, &RunStats::new(), &never)
            .await
    }

    /// Runs until `requested_count` iterations finished or `interrupted` is set.
    ///
    /// `stats` is updated as iterations finish so callers can report progress.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::SessionRejected`] on the first session rejection
    /// - [`GenerationError::Provider`] on any other fatal provider error
    /// - [`GenerationError::Sink`] when a reserved alias cannot be recorded
    #[instrument(skip(self, provider, sink, stats, interrupted), fields(requested = self.budget.requested_count))]
    pub async fn run_with<P, S>(
        &self,
        provider: &P,
        label: &str,
        sink: &mut S,
        stats: &RunStats,
        interrupted: &AtomicBool,
    ) -> Result<RunReport, GenerationError>
    where
        P: AliasProvider + ?Sized,
        S: ResultSink + ?Sized,
    {
        info!(
            max_attempts = self.retry_policy.max_attempts(),
            delay_ms = self.budget.delay_between_requests.as_millis(),
            "starting generation run"
        );

        let mut pacer = self.budget.pacer();
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = RunReport {
            requested: self.budget.requested_count,
            ..RunReport::default()
        };
        let mut backoff_waited = Duration::ZERO;

        for index in 0..self.budget.requested_count {
            if !pacer.wait_turn(interrupted).await {
                info!(index, "interrupted before iteration");
                report.interrupted = true;
                break;
            }

            let step = self
                .run_iteration(provider, label, index, stats, interrupted, &mut backoff_waited)
                .await;

            let outcome = match step {
                Step::Done(outcome) => outcome,
                Step::Interrupted => {
                    info!(index, "interrupted during iteration");
                    report.interrupted = true;
                    break;
                }
                Step::Fatal(source) => {
                    warn!(
                        index,
                        reserved_before_abort = report.reserved(),
                        error = %source,
                        "aborting run"
                    );
                    let report = Box::new(finish_report(report, stats, &pacer, backoff_waited));
                    return Err(match source {
                        ProviderError::Auth { .. } => {
                            GenerationError::SessionRejected { report, source }
                        }
                        other => GenerationError::Provider {
                            report,
                            source: other,
                        },
                    });
                }
            };

            let outcome = deduplicate(outcome, &mut seen);

            if let Some(record) = outcome.reserved_record() {
                if let Err(source) = sink.accept(record) {
                    return Err(GenerationError::Sink {
                        address: record.address.clone(),
                        report: Box::new(finish_report(report, stats, &pacer, backoff_waited)),
                        source,
                    });
                }
                info!(index, address = %record.address, "alias reserved");
                stats.increment_reserved();
                pacer.record_reserved();
            } else {
                warn!(
                    index,
                    state = ?outcome.state(),
                    reason = outcome.failure_reason().unwrap_or_default(),
                    "iteration failed"
                );
                stats.increment_failed();
            }

            report.outcomes.push(outcome);
        }

        let report = finish_report(report, stats, &pacer, backoff_waited);

        info!(
            reserved = report.reserved(),
            failed = report.failed(),
            retried = report.retried,
            interrupted = report.interrupted,
            "generation run complete"
        );

        Ok(report)
    }

    async fn run_iteration<P>(
        &self,
        provider: &P,
        label: &str,
        index: usize,
        stats: &RunStats,
        interrupted: &AtomicBool,
        waited: &mut Duration,
    ) -> Step
    where
        P: AliasProvider + ?Sized,
    {
        let mut failures: u32 = 0;
        transition(index, IterationState::Pending, IterationState::Generating);

        'generation: loop {
            let candidate = match provider.generate_candidate().await {
                Ok(candidate) => candidate,
                Err(error) => {
                    failures += 1;
                    match self
                        .recover(error, failures, stats, interrupted, waited)
                        .await
                    {
                        Recovery::Retry => continue 'generation,
                        Recovery::Exhausted(reason) => {
                            transition(index, IterationState::Generating, IterationState::GenFailed);
                            return Step::Done(IterationOutcome::GenFailed {
                                attempts: failures,
                                reason,
                            });
                        }
                        Recovery::Interrupted => return Step::Interrupted,
                        Recovery::Fatal(error) => return Step::Fatal(error),
                    }
                }
            };

            transition(index, IterationState::Generating, IterationState::Generated);
            debug!(index, address = %candidate.address, "candidate generated");

            loop {
                transition(index, IterationState::Generated, IterationState::Reserving);
                match provider.reserve(&candidate, label).await {
                    Ok(mut record) => {
                        if record.label != label {
                            warn!(index, returned = %record.label, "provider changed the label; keeping the requested one");
                            label.clone_into(&mut record.label);
                        }
                        record.status = AliasStatus::Reserved;
                        transition(index, IterationState::Reserving, IterationState::Reserved);
                        return Step::Done(IterationOutcome::Reserved {
                            record,
                            retries: failures,
                        });
                    }
                    Err(error) => {
                        failures += 1;
                        let consumed = classify_error(&error) == FailureType::Consumed;
                        match self
                            .recover(error, failures, stats, interrupted, waited)
                            .await
                        {
                            Recovery::Retry if consumed => {
                                transition(
                                    index,
                                    IterationState::Reserving,
                                    IterationState::RetryGenerating,
                                );
                                continue 'generation;
                            }
                            Recovery::Retry => {}
                            Recovery::Exhausted(reason) => {
                                transition(
                                    index,
                                    IterationState::Reserving,
                                    IterationState::ReserveFailed,
                                );
                                return Step::Done(IterationOutcome::ReserveFailed {
                                    record: AliasRecord::failed(candidate.address, label),
                                    attempts: failures,
                                    reason,
                                });
                            }
                            Recovery::Interrupted => return Step::Interrupted,
                            Recovery::Fatal(error) => return Step::Fatal(error),
                        }
                    }
                }
            }
        }
    }

    async fn recover(
        &self,
        error: ProviderError,
        failures: u32,
        stats: &RunStats,
        interrupted: &AtomicBool,
        waited: &mut Duration,
    ) -> Recovery {
        let failure_type = classify_error(&error);
        if failure_type == FailureType::Fatal {
            return Recovery::Fatal(error);
        }

        let retry_after = match &error {
            ProviderError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        };

        match self
            .retry_policy
            .should_retry(failure_type, failures, retry_after)
        {
            RetryDecision::Retry { delay, attempt } => {
                warn!(
                    attempt,
                    max_attempts = self.retry_policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "retrying after failure"
                );
                stats.increment_retried();
                let started = Instant::now();
                let completed = sleep_unless_interrupted(delay, interrupted).await;
                *waited += started.elapsed();
                if completed {
                    Recovery::Retry
                } else {
                    Recovery::Interrupted
                }
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(%reason, "giving up on iteration");
                Recovery::Exhausted(format!("{error} ({reason})"))
            }
        }
    }
}

/// Fills in the run-wide counters of a report.
fn finish_report(
    mut report: RunReport,
    stats: &RunStats,
    pacer: &RequestPacer,
    backoff_waited: Duration,
) -> RunReport {
    report.retried = stats.retried();
    report.waited = pacer.waited() + backoff_waited;
    report
}

/// Turns a repeated address into a failure so no address is emitted twice.
fn deduplicate(outcome: IterationOutcome, seen: &mut HashSet<String>) -> IterationOutcome {
    match outcome {
        IterationOutcome::Reserved { record, retries } => {
            if seen.insert(record.address.clone()) {
                IterationOutcome::Reserved { record, retries }
            } else {
                warn!(address = %record.address, "provider returned an address already recorded in this run");
                IterationOutcome::ReserveFailed {
                    record: AliasRecord::failed(record.address, record.label),
                    attempts: retries + 1,
                    reason: "address already recorded in this run".to_string(),
                }
            }
        }
        other => other,
    }
}

fn transition(index: usize, from: IterationState, to: IterationState) {
    trace!(index, ?from, ?to, terminal = to.is_terminal(), "iteration transition");
}
