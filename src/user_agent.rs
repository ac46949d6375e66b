//! Shared identification strings for provider requests.
//!
//! The provider's web API only answers browser-originated traffic, so requests
//! present a desktop browser User-Agent. The tool identifies itself in the
//! reservation note instead, which shows up in the provider's management UI.

/// Browser User-Agent sent with every provider request.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Returns the User-Agent used for provider requests.
#[must_use]
pub(crate) fn default_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}

/// Note attached to every reserved alias (includes crate version).
#[must_use]
pub(crate) fn reservation_note() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("Generated through hidemail/{version}")
}
