//! Alias data model.
//!
//! A generate call yields an [`AliasCandidate`]; a successful reservation turns
//! it into an [`AliasRecord`]. Listing the account returns [`ListedAlias`]
//! entries, which describe aliases created by any client.

use std::fmt;

use chrono::{DateTime, Utc};

/// An alias address offered by the provider but not yet reserved.
///
/// Candidates are short-lived: they must be reserved within the same run or
/// dropped. The provider may attach an opaque token that has to be echoed
/// back on reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCandidate {
    /// The offered alias address.
    pub address: String,
    /// Opaque proof returned with the candidate, if the provider sends one.
    pub token: Option<String>,
}

impl AliasCandidate {
    /// Creates a candidate without a token.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: None,
        }
    }

    /// Attaches the provider's proof token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Outcome attached to an [`AliasRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasStatus {
    /// The alias was reserved and is usable.
    Reserved,
    /// Reservation exhausted its attempts; never handed to a sink.
    Failed,
}

impl AliasStatus {
    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AliasStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final record of one generation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRecord {
    /// The alias address.
    pub address: String,
    /// Label the alias was reserved under.
    pub label: String,
    /// When the provider created the alias (or when the record was built).
    pub created_at: DateTime<Utc>,
    /// Whether the reservation succeeded.
    pub status: AliasStatus,
}

impl AliasRecord {
    /// Builds a reserved record.
    #[must_use]
    pub fn reserved(
        address: impl Into<String>,
        label: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            address: address.into(),
            label: label.into(),
            created_at,
            status: AliasStatus::Reserved,
        }
    }

    /// Builds a failed record for a candidate whose reservation was abandoned.
    #[must_use]
    pub fn failed(address: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            label: label.into(),
            created_at: Utc::now(),
            status: AliasStatus::Failed,
        }
    }

    /// Returns true when the record represents a usable alias.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.status == AliasStatus::Reserved
    }
}

/// An alias as reported by the provider's listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedAlias {
    /// Label shown in the provider UI.
    pub label: String,
    /// The alias address.
    pub address: String,
    /// Creation time reported by the provider.
    pub created_at: Option<DateTime<Utc>>,
    /// Whether the alias currently forwards mail.
    pub active: bool,
}

impl ListedAlias {
    /// Returns `Active` or `Inactive`.
    #[must_use]
    pub fn status_label(&self) -> &'static str {
        if self.active { "Active" } else { "Inactive" }
    }
}

/// Converts a provider millisecond timestamp into UTC.
#[must_use]
pub(crate) fn timestamp_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}
