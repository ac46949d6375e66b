//! Session cookie handling.
//!
//! This module reads the cookie exported from a logged-in browser and turns
//! it into the immutable [`Session`] the provider client authenticates with.

mod cookies;
mod session;

pub use cookies::{
    CookieError, CookiePair, extract_account_id, parse_cookie_header, read_cookie_file,
    read_cookie_source,
};
pub use session::{Session, SessionError};
