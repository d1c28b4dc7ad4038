//! Notification feed reconciliation.
//!
//! Live push notifications and historical notifications are normalized into
//! one record type and merged into a bounded feed with optimistic read state.

pub mod age;
mod counter;
mod engine;
mod events;
mod link;
mod models;
mod normalizer;
mod store;
mod sync;

pub use counter::UnreadCounter;
pub use engine::{FeedEngine, FeedSettings, ReloadPolicy};
pub use events::FeedEvent;
pub use link::resolve_link;
pub use models::{
    HistoricalInput, LiveInput, NotificationId, NotificationKind, NotificationRecord,
    RawNotification, ServerId, ServerStatus, LOCAL_ID_PREFIX, NO_LINK,
};
pub use normalizer::{Normalizer, DEFAULT_TITLE, UNREADABLE_DETAIL};
pub use store::{FeedStore, InsertOutcome, ReadTransition, MAX_FEED_SIZE};
pub use sync::{MarkReadIntent, ReadStateSynchronizer, SyncOutcome, SyncTarget};
