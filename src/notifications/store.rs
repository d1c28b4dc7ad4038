//! Bounded, ordered feed of canonical records.
//!
//! The head of the feed is the most recent notification. Order is insertion
//! order and is never recomputed from timestamps.

use std::collections::VecDeque;

use super::models::{NotificationId, NotificationRecord};

/// Default number of notifications kept in the feed.
pub const MAX_FEED_SIZE: usize = 15;

/// Result of a read-state mutation on a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTransition {
    /// The record was unread and is now read.
    Changed,
    /// The record was already read.
    NoOp,
    /// No record with that id is in the feed.
    NotFound,
}

/// What happened on a head insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// Index of the inserted record, always the head.
    pub position: usize,
    /// A record with the same id was already present and has been replaced.
    pub replaced: bool,
    /// The tail record pushed out by the insertion, if capacity was exceeded.
    pub evicted: Option<NotificationRecord>,
}

#[derive(Debug, Clone)]
pub struct FeedStore {
    records: VecDeque<NotificationRecord>,
    capacity: usize,
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new(MAX_FEED_SIZE)
    }
}

impl FeedStore {
    /// Create an empty store. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Place a live record at the head, evicting the tail when full.
    pub fn insert_live(&mut self, record: NotificationRecord) -> InsertOutcome {
        self.insert_at_head(record)
    }

    /// Replace the whole feed with server data.
    ///
    /// `records` are newest-first. They are inserted oldest-first at the head,
    /// so the final order matches the server order and only the most recent
    /// `capacity` records survive.
    pub fn load_historical(&mut self, records: Vec<NotificationRecord>) {
        self.records.clear();
        for record in records.into_iter().rev() {
            self.insert_at_head(record);
        }
    }

    fn insert_at_head(&mut self, mut record: NotificationRecord) -> InsertOutcome {
        let mut replaced = false;
        if let Some(pos) = self.position(&record.id) {
            if let Some(previous) = self.records.remove(pos) {
                // read state never goes back to unread
                record.is_read |= previous.is_read;
                replaced = true;
            }
        }

        self.records.push_front(record);

        let evicted = if self.records.len() > self.capacity {
            self.records.pop_back()
        } else {
            None
        };

        InsertOutcome {
            position: 0,
            replaced,
            evicted,
        }
    }

    /// Mark one record as read.
    pub fn set_read(&mut self, id: &NotificationId) -> ReadTransition {
        match self.records.iter_mut().find(|r| &r.id == id) {
            None => ReadTransition::NotFound,
            Some(record) if record.is_read => ReadTransition::NoOp,
            Some(record) => {
                record.is_read = true;
                ReadTransition::Changed
            }
        }
    }

    /// Mark every record as read, returning how many were unread.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for record in self.records.iter_mut().filter(|r| !r.is_read) {
            record.is_read = true;
            changed += 1;
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_read).count()
    }

    pub fn get(&self, id: &NotificationId) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &NotificationId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NotificationRecord> {
        self.records.iter()
    }

    /// Owned copy of the feed, head first.
    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
