//! Events emitted by the feed engine to its presenter.

use super::models::{NotificationId, NotificationRecord};
use super::sync::SyncTarget;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A live record was inserted at `position` (always the head).
    RecordInserted {
        record: NotificationRecord,
        position: usize,
    },
    /// A record was pushed out of the feed by a newer one.
    RecordEvicted { id: NotificationId },
    RecordReadStateChanged { id: NotificationId, is_read: bool },
    /// The feed was replaced by a historical load, head first.
    FeedReloaded { records: Vec<NotificationRecord> },
    UnreadCountChanged { count: usize },
    /// A mark-as-read request failed. Local state was kept.
    SyncFailed { target: SyncTarget, reason: String },
    /// The push channel closed or errored. It is not reopened.
    TransportFailed { reason: String },
    /// The historical fetch failed. The feed keeps its current contents.
    LoadFailed { reason: String },
}
