//! Provider seam for alias generation.
//!
//! - [`AliasProvider`] - Async trait with the two provider operations the
//!   generation loop needs
//! - [`HttpSessionClient`] - Cookie-authenticated implementation against the
//!   iCloud+ Hide My Email web API
//! - [`ProviderError`] - Typed outcome of a failed provider call
//!
//! # Example
//!
//! ```no_run
//! use hidemail_core::auth::Session;
//! use hidemail_core::provider::{AliasProvider, DEFAULT_BASE_URL, HttpSessionClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::from_cookie("X-APPLE-WEBAUTH-USER=\"v=1:s=0:d=1\"; ...", DEFAULT_BASE_URL)?;
//! let client = HttpSessionClient::new(session)?;
//! let candidate = client.generate_candidate().await?;
//! let record = client.reserve(&candidate, "newsletter").await?;
//! println!("{} reserved as {}", record.address, record.label);
//! # Ok(())
//! # }
//! ```

mod error;
mod http_client;
mod icloud;
mod payload;

pub use error::{Operation, ProviderError};
pub use http_client::ClientTimeouts;
pub use icloud::{DEFAULT_BASE_URL, HttpSessionClient};

use async_trait::async_trait;

use crate::alias::{AliasCandidate, AliasRecord};

/// The two provider operations the generation loop drives.
///
/// Each call performs exactly one outbound request; implementations must not
/// cache candidates between calls.
#[async_trait]
pub trait AliasProvider: Send + Sync {
    /// Requests a fresh candidate alias.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Auth`] when the session is rejected,
    /// [`ProviderError::RateLimited`] when throttled,
    /// [`ProviderError::Protocol`] for unparseable responses and
    /// [`ProviderError::Transport`] for network failures.
    async fn generate_candidate(&self) -> Result<AliasCandidate, ProviderError>;

    /// Reserves a candidate under `label`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`generate_candidate`](Self::generate_candidate), plus
    /// [`ProviderError::AlreadyReserved`] when the candidate was consumed.
    async fn reserve(
        &self,
        candidate: &AliasCandidate,
        label: &str,
    ) -> Result<AliasRecord, ProviderError>;
}
