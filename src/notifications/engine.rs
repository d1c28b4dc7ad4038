//! The feed engine.
//!
//! Owns the feed store, the unread counter, the normalizer and the
//! read-state synchronizer. The engine does no I/O: callers feed it inputs
//! and server answers, and observe it through [`FeedEvent`]s.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::client::ApiError;

use super::counter::UnreadCounter;
use super::events::FeedEvent;
use super::models::{
    HistoricalInput, LiveInput, NotificationId, NotificationRecord, RawNotification, ServerStatus,
};
use super::normalizer::Normalizer;
use super::store::{FeedStore, ReadTransition, MAX_FEED_SIZE};
use super::sync::{MarkReadIntent, ReadStateSynchronizer, SyncOutcome, SyncTarget};

const EVENT_CHANNEL_SIZE: usize = 256;

/// How a historical reload treats live notifications that arrived while the
/// fetch was in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicy {
    /// The reload replaces the feed; live records missing from the server
    /// answer disappear.
    #[default]
    LastWriterWins,
    /// Live records missing from the server answer are put back at the head.
    PreserveLive,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub capacity: usize,
    pub reload_policy: ReloadPolicy,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            capacity: MAX_FEED_SIZE,
            reload_policy: ReloadPolicy::default(),
        }
    }
}

pub struct FeedEngine {
    normalizer: Normalizer,
    store: FeedStore,
    counter: UnreadCounter,
    sync: ReadStateSynchronizer,
    reload_policy: ReloadPolicy,
    reload_in_flight: bool,
    live_during_reload: Vec<NotificationId>,
    events: broadcast::Sender<FeedEvent>,
}

impl Default for FeedEngine {
    fn default() -> Self {
        Self::new(FeedSettings::default())
    }
}

impl FeedEngine {
    pub fn new(settings: FeedSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            normalizer: Normalizer::new(),
            store: FeedStore::new(settings.capacity),
            counter: UnreadCounter::new(),
            sync: ReadStateSynchronizer::new(),
            reload_policy: settings.reload_policy,
            reload_in_flight: false,
            live_during_reload: Vec::new(),
            events,
        }
    }

    /// Subscribe to feed events.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// Sender side of the event stream, for handles that outlive a borrow of
    /// the engine.
    pub fn event_sender(&self) -> broadcast::Sender<FeedEvent> {
        self.events.clone()
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Insert a push-channel notification at the head of the feed.
    pub fn ingest_live(&mut self, input: LiveInput) -> NotificationId {
        self.ingest_live_at(input, Utc::now())
    }

    pub fn ingest_live_at(&mut self, input: LiveInput, now: DateTime<Utc>) -> NotificationId {
        let record = self
            .normalizer
            .normalize(RawNotification::Live(input), now);
        let id = record.id.clone();
        debug!("Live notification {} ({})", id, record.kind);

        let previous_unread = self.store.get(&id).map(|r| !r.is_read);
        let outcome = self.store.insert_live(record);

        let mut count = self.counter.get();
        if previous_unread == Some(true) {
            count = count.saturating_sub(1);
        }
        if let Some(inserted) = self.store.get(&id) {
            if !inserted.is_read {
                count += 1;
            }
            self.emit(FeedEvent::RecordInserted {
                record: inserted.clone(),
                position: outcome.position,
            });
        }
        if let Some(evicted) = outcome.evicted {
            if !evicted.is_read {
                count = count.saturating_sub(1);
            }
            self.emit(FeedEvent::RecordEvicted { id: evicted.id });
        }
        self.set_unread(count);

        if self.reload_in_flight {
            self.live_during_reload.push(id.clone());
        }
        id
    }

    /// Record that a historical fetch has been started.
    pub fn begin_reload(&mut self) {
        self.reload_in_flight = true;
        self.live_during_reload.clear();
    }

    /// Replace the feed with server data, newest-first.
    pub fn load_historical(&mut self, inputs: Vec<HistoricalInput>) {
        self.load_historical_at(inputs, Utc::now())
    }

    pub fn load_historical_at(&mut self, inputs: Vec<HistoricalInput>, now: DateTime<Utc>) {
        let read_ids: HashSet<NotificationId> = self
            .store
            .iter()
            .filter(|r| r.is_read)
            .map(|r| r.id.clone())
            .collect();

        let mut records: Vec<NotificationRecord> = inputs
            .into_iter()
            .map(|input| {
                self.normalizer
                    .normalize(RawNotification::Historical(input), now)
            })
            .collect();
        for record in records.iter_mut() {
            if read_ids.contains(&record.id) {
                record.is_read = true;
            }
        }

        let loaded: HashSet<&NotificationId> = records.iter().map(|r| &r.id).collect();
        let missing_live: Vec<NotificationRecord> = self
            .live_during_reload
            .iter()
            .filter(|id| !loaded.contains(id))
            .filter_map(|id| self.store.get(id).cloned())
            .collect();
        drop(loaded);

        let carried = match self.reload_policy {
            ReloadPolicy::PreserveLive => missing_live,
            ReloadPolicy::LastWriterWins => {
                if !missing_live.is_empty() {
                    debug!(
                        "Reload replaced {} live notifications received during the fetch",
                        missing_live.len()
                    );
                }
                Vec::new()
            }
        };

        self.store.load_historical(records);
        for record in carried {
            self.store.insert_live(record);
        }
        self.reload_in_flight = false;
        self.live_during_reload.clear();

        info!(
            "Feed loaded: {} notifications, {} unread",
            self.store.len(),
            self.store.unread_count()
        );
        self.emit(FeedEvent::FeedReloaded {
            records: self.store.snapshot(),
        });
        self.set_unread(self.store.unread_count());
    }

    /// The historical fetch failed; the feed keeps its contents.
    pub fn load_failed(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Failed to fetch historical notifications: {}", reason);
        self.reload_in_flight = false;
        self.live_during_reload.clear();
        self.emit(FeedEvent::LoadFailed { reason });
    }

    /// The push channel closed or errored.
    pub fn report_transport_failure(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Notification push channel failed: {}", reason);
        self.emit(FeedEvent::TransportFailed { reason });
    }

    // =========================================================================
    // Read state
    // =========================================================================

    /// Optimistically mark one notification as read.
    ///
    /// When the result is [`MarkReadIntent::Send`] the caller must send the
    /// request and report the answer with [`Self::complete_mark_read`].
    pub fn begin_mark_read(&mut self, id: &NotificationId) -> MarkReadIntent {
        match self.store.set_read(id) {
            ReadTransition::NotFound => {
                debug!("Mark as read for {} ignored, not in feed", id);
                MarkReadIntent::NotFound
            }
            ReadTransition::NoOp => MarkReadIntent::AlreadyRead,
            ReadTransition::Changed => {
                self.emit(FeedEvent::RecordReadStateChanged {
                    id: id.clone(),
                    is_read: true,
                });
                let mut counter = self.counter;
                counter.decrement();
                self.set_unread(counter.get());

                match id.server_id() {
                    Some(server_id) => {
                        self.sync.track(&SyncTarget::One(id.clone()));
                        MarkReadIntent::Send(server_id.to_string())
                    }
                    None => MarkReadIntent::LocalOnly,
                }
            }
        }
    }

    pub fn complete_mark_read(
        &mut self,
        id: &NotificationId,
        result: Result<ServerStatus, ApiError>,
    ) -> SyncOutcome {
        self.settle(SyncTarget::One(id.clone()), result)
    }

    /// Optimistically mark the whole feed as read.
    ///
    /// Returns how many records changed. A bulk request must be sent even when
    /// nothing changed locally, the server may hold unread notifications that
    /// are not in the feed.
    pub fn begin_mark_all_read(&mut self) -> usize {
        let unread: Vec<NotificationId> = self
            .store
            .iter()
            .filter(|r| !r.is_read)
            .map(|r| r.id.clone())
            .collect();
        let changed = self.store.mark_all_read();
        for id in unread {
            self.emit(FeedEvent::RecordReadStateChanged { id, is_read: true });
        }
        self.set_unread(self.store.unread_count());
        self.sync.track(&SyncTarget::All);
        changed
    }

    pub fn complete_mark_all_read(&mut self, result: Result<ServerStatus, ApiError>) -> SyncOutcome {
        self.settle(SyncTarget::All, result)
    }

    fn settle(&mut self, target: SyncTarget, result: Result<ServerStatus, ApiError>) -> SyncOutcome {
        let outcome = self.sync.settle(&target, result);
        if let SyncOutcome::Failed(e) = &outcome {
            self.emit(FeedEvent::SyncFailed {
                target,
                reason: e.to_string(),
            });
        }
        outcome
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn records(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.store.iter()
    }

    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.store.snapshot()
    }

    pub fn get(&self, id: &NotificationId) -> Option<&NotificationRecord> {
        self.store.get(id)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.counter.get()
    }

    pub fn badge_label(&self) -> String {
        self.counter.badge_label()
    }

    pub fn pending_count(&self) -> usize {
        self.sync.pending_count()
    }

    pub fn is_pending(&self, id: &NotificationId) -> bool {
        self.sync.is_pending(id)
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_in_flight
    }

    fn set_unread(&mut self, count: usize) {
        if self.counter.get() != count {
            self.counter.reset(count);
            self.emit(FeedEvent::UnreadCountChanged { count });
        }
    }

    fn emit(&self, event: FeedEvent) {
        // No receivers is fine, the engine works headless.
        let _ = self.events.send(event);
    }
}
