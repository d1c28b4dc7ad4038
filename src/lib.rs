//! Notification feed client library
//!
//! Reconciles live push notifications with the historical feed of a video
//! site, keeps an optimistic unread count and synchronizes read state with
//! the server of record.

pub mod cli_style;
pub mod client;
pub mod config;
pub mod notifications;
pub mod presenter;
pub mod session;

// Re-export commonly used types for convenience
pub use client::{ApiError, HttpNotificationApi, NotificationApi, PushChannel, PushError};
pub use notifications::{FeedEngine, FeedEvent, FeedSettings, NotificationId, NotificationRecord};
pub use session::{FeedHandle, FeedSession};
