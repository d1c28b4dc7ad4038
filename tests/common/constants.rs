//! Shared constants for end-to-end tests
//!
//! When fake site data changes (user id, cookies, tokens), update only this
//! file.

// ============================================================================
// Session
// ============================================================================

/// Id of the logged-in user whose feed is followed
pub const TEST_USER_ID: &str = "42";

/// Name of the session cookie the fake site requires
pub const SESSION_COOKIE_NAME: &str = "sessionid";

/// Value of the session cookie the fake site accepts
pub const SESSION_COOKIE_VALUE: &str = "test-session";

/// CSRF token set as a cookie by the notifications page
pub const TEST_CSRF_TOKEN: &str = "test-csrf-token";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for a feed event or a push connection
pub const EVENT_TIMEOUT_MS: u64 = 5000;

/// Interval between polls while waiting for a condition
pub const POLL_INTERVAL_MS: u64 = 10;

pub fn session_cookie() -> String {
    format!("{}={}", SESSION_COOKIE_NAME, SESSION_COOKIE_VALUE)
}
