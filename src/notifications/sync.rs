//! Read-state synchronization with the server of record.
//!
//! Mark-as-read intents are applied locally first. The synchronizer tracks
//! which intents are still in flight and maps server answers onto outcomes.
//! A failed request does not roll back the local mutation: the feed may show
//! a notification as read while the server still has it unread until the next
//! successful sync or reload.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, warn};

use crate::client::ApiError;

use super::models::{NotificationId, ServerStatus};

/// What a mark-as-read request applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncTarget {
    One(NotificationId),
    All,
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTarget::One(id) => write!(f, "notification {}", id),
            SyncTarget::All => f.write_str("all notifications"),
        }
    }
}

/// Local decision taken when the user marks a single record as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkReadIntent {
    /// Local state changed; the server must be told using this id.
    Send(String),
    /// Local state changed but the id only exists on this client.
    LocalOnly,
    /// Already read locally, nothing to do.
    AlreadyRead,
    /// The id is not in the feed, nothing to do.
    NotFound,
}

/// Terminal state of a mark-as-read request.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The server applied the change.
    Confirmed,
    /// The server had nothing to change.
    AlreadySatisfied,
    /// The request failed. The optimistic local state is kept.
    Failed(ApiError),
}

impl SyncOutcome {
    pub fn from_result(result: Result<ServerStatus, ApiError>) -> Self {
        match result {
            Ok(ServerStatus::Success) => SyncOutcome::Confirmed,
            Ok(ServerStatus::Noop) => SyncOutcome::AlreadySatisfied,
            Err(e) => SyncOutcome::Failed(e),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

/// Tracks in-flight mark-as-read requests.
#[derive(Debug, Default)]
pub struct ReadStateSynchronizer {
    pending: HashSet<NotificationId>,
    bulk_in_flight: usize,
}

impl ReadStateSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request that is about to be sent.
    pub fn track(&mut self, target: &SyncTarget) {
        match target {
            SyncTarget::One(id) => {
                self.pending.insert(id.clone());
            }
            SyncTarget::All => self.bulk_in_flight += 1,
        }
    }

    /// Settle a request with the server answer.
    pub fn settle(
        &mut self,
        target: &SyncTarget,
        result: Result<ServerStatus, ApiError>,
    ) -> SyncOutcome {
        match target {
            SyncTarget::One(id) => {
                if !self.pending.remove(id) {
                    debug!("Settling {} which was not pending", target);
                }
            }
            SyncTarget::All => self.bulk_in_flight = self.bulk_in_flight.saturating_sub(1),
        }

        let outcome = SyncOutcome::from_result(result);
        match &outcome {
            SyncOutcome::Confirmed => debug!("Server confirmed read state for {}", target),
            SyncOutcome::AlreadySatisfied => {
                debug!("Server reported {} as already read", target)
            }
            SyncOutcome::Failed(e) => warn!(
                "Failed to mark {} as read on server, keeping local state: {}",
                target, e
            ),
        }
        outcome
    }

    pub fn is_pending(&self, id: &NotificationId) -> bool {
        self.pending.contains(id)
    }

    /// Number of requests in flight, single and bulk.
    pub fn pending_count(&self) -> usize {
        self.pending.len() + self.bulk_in_flight
    }
}
