//! Errors that end a generation run early.

use thiserror::Error;

use super::{RunReport, SinkError};
use crate::provider::ProviderError;

/// Run-level failures. Per-alias failures are reported in the
/// [`RunReport`] instead; each variant carries the partial report of the
/// iterations that finished before the run stopped.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The provider rejected the session; nothing more can be reserved.
    #[error(
        "session invalid, re-export your cookie ({} alias(es) reserved before the session was rejected)",
        .report.reserved()
    )]
    SessionRejected {
        /// Iterations finished before the abort.
        report: Box<RunReport>,
        /// The rejecting provider error.
        #[source]
        source: ProviderError,
    },

    /// A non-session fatal provider error.
    #[error(
        "provider unusable ({} alias(es) reserved before the failure)",
        .report.reserved()
    )]
    Provider {
        /// Iterations finished before the abort.
        report: Box<RunReport>,
        /// The fatal provider error.
        #[source]
        source: ProviderError,
    },

    /// The result sink could not store a reserved alias.
    #[error("failed to record reserved alias {address}")]
    Sink {
        /// The alias that was reserved but not stored.
        address: String,
        /// Iterations stored before the failure.
        report: Box<RunReport>,
        /// The sink failure.
        #[source]
        source: SinkError,
    },
}

impl GenerationError {
    /// Partial report of the iterations finished before the run stopped.
    #[must_use]
    pub fn report(&self) -> &RunReport {
        match self {
            Self::SessionRejected { report, .. }
            | Self::Provider { report, .. }
            | Self::Sink { report, .. } => report,
        }
    }

    /// Number of aliases handed to the sink before the run stopped.
    #[must_use]
    pub fn reserved_before_abort(&self) -> usize {
        self.report().reserved()
    }

    /// Returns true when the session must be refreshed before retrying.
    #[must_use]
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, Self::SessionRejected { .. })
    }
}
