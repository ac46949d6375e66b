//! Error types for provider operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Provider call that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Request a new candidate alias.
    Generate,
    /// Reserve a candidate under a label.
    Reserve,
    /// List the account's aliases.
    List,
}

impl Operation {
    /// Returns the stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Reserve => "reserve",
            Self::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by an [`AliasProvider`](super::AliasProvider).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the session (expired or invalid cookie).
    ///
    /// Unrecoverable for the run.
    #[error(
        "[AUTH] session rejected during {operation} (HTTP {status}): {message}\n  Suggestion: session invalid, re-export your cookie from a logged-in browser"
    )]
    Auth {
        /// Operation that was rejected.
        operation: Operation,
        /// HTTP status (0 when the rejection came from the response body).
        status: u16,
        /// Provider message, if any.
        message: String,
    },

    /// The provider throttled the request or answered ambiguously.
    #[error("rate limited during {operation}: {reason}")]
    RateLimited {
        /// Operation that was throttled.
        operation: Operation,
        /// Provider-advised wait (from `Retry-After`), if present.
        retry_after: Option<Duration>,
        /// Provider message or status description.
        reason: String,
    },

    /// The candidate was already consumed by a concurrent or prior call.
    #[error("alias {address} is already reserved: {reason}")]
    AlreadyReserved {
        /// The candidate address.
        address: String,
        /// Provider message.
        reason: String,
    },

    /// The response could not be parsed.
    #[error("protocol error during {operation}: {reason}")]
    Protocol {
        /// Operation whose response was malformed.
        operation: Operation,
        /// What was wrong with the response.
        reason: String,
    },

    /// Network-level failure (DNS, connect, timeout, TLS, body read).
    #[error("network error during {operation}: {message}")]
    Transport {
        /// Operation that failed.
        operation: Operation,
        /// Description of the failure.
        message: String,
        /// Whether the request timed out.
        timed_out: bool,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client construction failed: {reason}")]
    ClientBuild {
        /// Description of the failure.
        reason: String,
    },
}

impl ProviderError {
    /// Creates an authentication error.
    pub fn auth(operation: Operation, status: u16, message: impl Into<String>) -> Self {
        Self::Auth {
            operation,
            status,
            message: message.into(),
        }
    }

    /// Creates a rate-limit error.
    pub fn rate_limited(
        operation: Operation,
        retry_after: Option<Duration>,
        reason: impl Into<String>,
    ) -> Self {
        Self::RateLimited {
            operation,
            retry_after,
            reason: reason.into(),
        }
    }

    /// Creates an already-reserved error.
    pub fn already_reserved(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AlreadyReserved {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(operation: Operation, reason: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            reason: reason.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(operation: Operation, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates a transport error from a reqwest error.
    pub fn from_reqwest(operation: Operation, error: &reqwest::Error) -> Self {
        Self::Transport {
            operation,
            message: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }

    /// Returns true when the session is unusable for the rest of the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::ClientBuild { .. })
    }
}
