//! Anti-forgery token lookup.
//!
//! The server of record sets the token as a cookie; every mutating request
//! echoes it back in a header.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Clone)]
pub struct CsrfSource {
    cookie_name: String,
    /// Fixed token that takes precedence over the cookie jar.
    fixed_token: Option<String>,
}

impl Default for CsrfSource {
    fn default() -> Self {
        Self::new(DEFAULT_CSRF_COOKIE, None)
    }
}

impl CsrfSource {
    pub fn new(cookie_name: impl Into<String>, fixed_token: Option<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            fixed_token: fixed_token.filter(|t| !t.is_empty()),
        }
    }

    /// Current token for requests to `url`, if any.
    pub fn token(&self, jar: &Jar, url: &Url) -> Option<String> {
        if let Some(token) = &self.fixed_token {
            return Some(token.clone());
        }
        let header = jar.cookies(url)?;
        let header = header.to_str().ok()?;
        cookie_value(header, &self.cookie_name)
    }
}

/// Extract and percent-decode a cookie from a `Cookie` header value.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != name {
            return None;
        }
        let decoded = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        Some(decoded)
    })
}
