//! hidemail core library
//!
//! This library drives the iCloud+ "Hide My Email" web API from a browser
//! session cookie captured earlier, creating labelled forwarding aliases
//! under the provider's informal rate limits.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Cookie parsing and the immutable [`Session`] value
//! - [`alias`] - Alias candidates, records and listing entries
//! - [`provider`] - The [`AliasProvider`] seam and its HTTP implementation
//! - [`generate`] - The generation loop, retry policy, pacing and result sinks

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alias;
pub mod auth;
pub mod generate;
pub mod provider;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use alias::{AliasCandidate, AliasRecord, AliasStatus, ListedAlias};
pub use auth::{
    CookieError, CookiePair, Session, SessionError, extract_account_id, parse_cookie_header,
    read_cookie_file,
};
pub use generate::{
    CollectingSink, DEFAULT_MAX_ATTEMPTS, FailureType, GenerationError, GenerationLoop,
    IterationOutcome, IterationState, LineFileSink, RecordFormat, RequestPacer, ResultSink,
    RetryDecision, RetryPolicy, RunBudget, RunReport, RunStats, SinkError, classify_error,
    parse_retry_after,
};
pub use provider::{
    AliasProvider, ClientTimeouts, DEFAULT_BASE_URL, HttpSessionClient, Operation, ProviderError,
};
