//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestFeed, TestSite};
//!
//! #[tokio::test]
//! async fn test_feed_loads() {
//!     let site = TestSite::spawn().await;
//!     let feed = TestFeed::start(&site, Default::default(), false);
//!     feed.handle.settled().await.unwrap();
//! }
//! ```

mod client;
mod constants;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::{anonymous_api, authenticated_api, push_channel, TestFeed};
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use server::{PushFrame, StoredNotification, TestSite};
