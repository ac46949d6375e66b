//! Immutable authenticated session built from an exported cookie.

use std::fmt;

use reqwest::header::HeaderValue;
use tracing::{debug, instrument, warn};
use url::Url;

use super::cookies::{CookieError, extract_account_id, parse_cookie_header};

/// Errors building a [`Session`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The cookie string could not be parsed.
    #[error("invalid session cookie: {0}")]
    Cookie(#[from] CookieError),

    /// The cookie contains characters that cannot be sent in an HTTP header.
    #[error("session cookie contains characters not allowed in an HTTP header")]
    InvalidHeaderValue,

    /// The provider base endpoint is not an absolute http(s) URL.
    #[error("invalid provider endpoint '{url}': {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Authenticated identity for one run.
///
/// Holds the raw cookie header, the account id derived from it (when the
/// provider's account cookie is present) and the provider base endpoint.
/// Nothing here changes after construction.
#[derive(Clone)]
pub struct Session {
    cookie_header: String,
    account_id: Option<String>,
    base_url: Url,
}

impl Session {
    /// Builds a session from a raw cookie string and provider base endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the cookie has no valid pairs, cannot be
    /// sent as a header, or the endpoint is not an absolute http(s) URL.
    #[instrument(level = "debug", skip(raw_cookie))]
    pub fn from_cookie(raw_cookie: &str, base_url: &str) -> Result<Self, SessionError> {
        let raw_cookie = raw_cookie.trim();
        let pairs = parse_cookie_header(raw_cookie)?;
        HeaderValue::from_str(raw_cookie).map_err(|_| SessionError::InvalidHeaderValue)?;

        let base_url = parse_endpoint(base_url)?;
        let account_id = extract_account_id(&pairs);
        if account_id.is_none() {
            warn!("account cookie missing from session; requests are sent without dsid");
        }

        debug!(
            cookies = pairs.len(),
            has_account_id = account_id.is_some(),
            endpoint = %base_url,
            "session constructed"
        );

        Ok(Self {
            cookie_header: raw_cookie.to_string(),
            account_id,
            base_url,
        })
    }

    /// Returns the raw `Cookie` header value.
    ///
    /// Sensitive; avoid logging the return value.
    #[must_use]
    pub fn cookie_header(&self) -> &str {
        &self.cookie_header
    }

    /// Returns the account id derived from the cookie, if any.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    /// Returns the provider base endpoint.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins a provider path (such as `v1/hme/generate`) onto the base endpoint.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie_header", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, SessionError> {
    let url = Url::parse(raw.trim()).map_err(|e| SessionError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SessionError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BASE: &str = "https://p68-maildomainws.icloud.com";

    #[test]
    fn test_session_from_cookie_extracts_account_id() {
        let session =
            Session::from_cookie("X-APPLE-WEBAUTH-USER=\"v=1:s=0:d=777\"; t=abc", BASE).unwrap();
        assert_eq!(session.account_id(), Some("777"));
        assert_eq!(
            session.cookie_header(),
            "X-APPLE-WEBAUTH-USER=\"v=1:s=0:d=777\"; t=abc"
        );
    }

    #[test]
    fn test_session_without_account_cookie_is_allowed() {
        let session = Session::from_cookie("a=1", BASE).unwrap();
        assert_eq!(session.account_id(), None);
    }

    #[test]
    fn test_session_trims_cookie_whitespace() {
        let session = Session::from_cookie("  a=1; b=2 \n", BASE).unwrap();
        assert_eq!(session.cookie_header(), "a=1; b=2");
    }

    #[test]
    fn test_session_rejects_cookie_without_pairs() {
        let result = Session::from_cookie("nonsense", BASE);
        assert!(matches!(result, Err(SessionError::Cookie(_))));
    }

    #[test]
    fn test_session_rejects_control_characters() {
        let result = Session::from_cookie("a=1\u{7}", BASE);
        assert!(matches!(result, Err(SessionError::InvalidHeaderValue)));
    }

    #[test]
    fn test_session_rejects_non_http_endpoint() {
        let result = Session::from_cookie("a=1", "ftp://example.com");
        assert!(matches!(result, Err(SessionError::InvalidEndpoint { .. })));
        let result = Session::from_cookie("a=1", "not a url");
        assert!(matches!(result, Err(SessionError::InvalidEndpoint { .. })));
    }

    #[test]
    fn test_session_endpoint_joins_paths() {
        let session = Session::from_cookie("a=1", "http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            session.endpoint("/v1/hme/generate"),
            "http://127.0.0.1:8080/v1/hme/generate"
        );
        let session = Session::from_cookie("a=1", "http://127.0.0.1:8080/prefix").unwrap();
        assert_eq!(
            session.endpoint("v2/hme/list"),
            "http://127.0.0.1:8080/prefix/v2/hme/list"
        );
    }

    #[test]
    fn test_session_debug_redacts_cookie() {
        let session = Session::from_cookie("token=very-secret", BASE).unwrap();
        let debug = format!("{session:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
