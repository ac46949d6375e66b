//! Raw cookie string parsing and cookie file loading.
//!
//! The session cookie is exported from a logged-in browser as a single
//! `Cookie` header value (`name=value; name2=value2`). It is treated as an
//! opaque credential: it is sent verbatim, and only parsed far enough to pull
//! out the account identifier the provider expects as a query parameter.

use std::fmt;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, instrument, warn};

/// Cookie carrying the account descriptor (`v=1:s=0:d=<dsid>`).
const ACCOUNT_COOKIE_NAME: &str = "X-APPLE-WEBAUTH-USER";

/// Prefix marking comment lines in a cookie file.
const COMMENT_PREFIX: &str = "//";

/// A single `name=value` pair from a raw cookie string.
///
/// The value is redacted in Debug output to prevent accidental logging of
/// session credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct CookiePair {
    /// Cookie name.
    pub name: String,
    /// Cookie value (sensitive, never log).
    value: String,
}

impl CookiePair {
    /// Creates a new cookie pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CookiePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookiePair")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Errors that can occur while reading or parsing a session cookie.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// I/O error reading the cookie file.
    #[error("failed to read cookie file '{path}': {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cookie source contained only blank or comment lines.
    #[error("no cookie found in {origin} (only blank or `//` comment lines)")]
    Empty {
        /// Where the cookie was expected (file path or "input").
        origin: String,
    },

    /// The cookie string had no `name=value` pair at all.
    #[error("cookie string contains no name=value pairs ({malformed_count} segments skipped)")]
    NoPairs {
        /// Number of segments that failed to parse.
        malformed_count: usize,
    },
}

/// Reads the cookie string from a cookie file.
///
/// Lines starting with `//` and blank lines are skipped; the first remaining
/// line is the cookie header value.
///
/// # Errors
///
/// Returns [`CookieError::Io`] when the file cannot be read and
/// [`CookieError::Empty`] when it holds no cookie line.
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn read_cookie_file(path: &Path) -> Result<String, CookieError> {
    let file = std::fs::File::open(path).map_err(|source| CookieError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_cookie_source(std::io::BufReader::new(file), &path.display().to_string())
}

/// Reads the first non-comment, non-blank line from a reader.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure or [`CookieError::Empty`] when
/// no cookie line exists.
pub fn read_cookie_source(reader: impl BufRead, origin: &str) -> Result<String, CookieError> {
    for line_result in reader.lines() {
        let line = line_result.map_err(|source| CookieError::Io {
            path: origin.to_string(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
            continue;
        }
        debug!(origin, length = line.len(), "read cookie line");
        return Ok(line.to_string());
    }

    Err(CookieError::Empty {
        origin: origin.to_string(),
    })
}

/// Parses a raw `Cookie` header value into name/value pairs.
///
/// Segments are separated by `;`. Segments without `=` or with an empty name
/// are skipped with a warning (partial success).
///
/// # Errors
///
/// Returns [`CookieError::NoPairs`] when no segment is a valid pair.
#[instrument(level = "debug", skip(raw))]
pub fn parse_cookie_header(raw: &str) -> Result<Vec<CookiePair>, CookieError> {
    let mut pairs = Vec::new();
    let mut malformed_count = 0;

    for (idx, segment) in raw.split(';').enumerate() {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        match segment.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                pairs.push(CookiePair::new(name.trim(), value.trim()));
            }
            _ => {
                malformed_count += 1;
                warn!(segment = idx + 1, "skipping malformed cookie segment");
            }
        }
    }

    if pairs.is_empty() {
        return Err(CookieError::NoPairs { malformed_count });
    }

    debug!(count = pairs.len(), malformed_count, "parsed cookie pairs");
    Ok(pairs)
}

/// Extracts the account identifier (`dsid`) from the account cookie.
///
/// The cookie value looks like `"v=1:s=0:d=1234567890"`; surrounding quotes
/// are optional. Returns `None` when the cookie or the `d=` field is absent.
#[must_use]
pub fn extract_account_id(pairs: &[CookiePair]) -> Option<String> {
    let cookie = pairs
        .iter()
        .find(|pair| pair.name.eq_ignore_ascii_case(ACCOUNT_COOKIE_NAME))?;

    cookie
        .value()
        .trim_matches('"')
        .split(':')
        .find_map(|field| field.strip_prefix("d="))
        .filter(|dsid| !dsid.is_empty())
        .map(str::to_string)
}
