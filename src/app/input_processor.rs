//! Cookie loading: turn the configured cookie file into a provider session.

use std::path::Path;

use anyhow::{Context, Result, bail};
use hidemail_core::{Session, read_cookie_file};
use tracing::debug;

/// Hint shown when the cookie file cannot be used.
pub(crate) const COOKIE_EXPORT_HINT: &str = "Export the Cookie header of a request to icloud.com from a logged-in browser \
     session and save it as the first non-comment line of the cookie file.";

/// Reads the cookie file and builds the session for `base_url`.
pub(crate) fn load_session(cookie_file: &Path, base_url: &str) -> Result<Session> {
    if !cookie_file.exists() {
        bail!(
            "Cookie file '{}' not found.\n  {COOKIE_EXPORT_HINT}",
            cookie_file.display()
        );
    }

    let raw = read_cookie_file(cookie_file)
        .with_context(|| format!("Failed to read cookie file '{}'", cookie_file.display()))
        .with_context(|| COOKIE_EXPORT_HINT.to_string())?;

    let session = Session::from_cookie(&raw, base_url)
        .with_context(|| format!("Invalid session cookie in '{}'", cookie_file.display()))?;

    debug!(endpoint = %session.base_url(), "session ready");
    Ok(session)
}
