//! Alias generation: the retrying, paced, cancellable loop.
//!
//! This module provides:
//! - [`GenerationLoop`] - Drives generate/reserve cycles against an
//!   [`AliasProvider`](crate::provider::AliasProvider)
//! - [`RunBudget`] - How many aliases, how many attempts, how much pacing
//! - [`RetryPolicy`] - Exponential backoff with jitter, shared by both operations
//! - [`RequestPacer`] - Minimum spacing between iterations and batch cooldowns
//! - [`ResultSink`] - Where reserved aliases go as soon as they exist
//! - [`RunReport`] - Per-iteration outcomes of a run

mod engine;
mod error;
mod pacing;
mod retry;
mod sink;

pub use engine::{
    DEFAULT_COOLDOWN, DEFAULT_DELAY_BETWEEN_REQUESTS, DEFAULT_REQUESTED_COUNT, GenerationLoop,
    IterationOutcome, IterationState, RunBudget, RunReport, RunStats,
};
pub use error::GenerationError;
pub use pacing::{RequestPacer, parse_retry_after, sleep_unless_interrupted};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, DEFAULT_TRANSIENT_BACKOFF, FailureType,
    RetryDecision, RetryPolicy, classify_error,
};
pub use sink::{CollectingSink, LineFileSink, RecordFormat, ResultSink, SinkError, TIMESTAMP_FORMAT};
