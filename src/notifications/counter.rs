//! Unread counter.
//!
//! Tracks the optimistic unread count incrementally. It can always be
//! recomputed from the feed store, and is reset from it on reloads.

/// Largest count shown as a number on the badge.
const BADGE_LIMIT: usize = 9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnreadCounter {
    count: usize,
}

impl UnreadCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(count: usize) -> Self {
        Self { count }
    }

    pub fn get(&self) -> usize {
        self.count
    }

    pub fn increment(&mut self) {
        self.count += 1;
    }

    /// Decrease by one, never going below zero.
    pub fn decrement(&mut self) {
        self.count = self.count.saturating_sub(1);
    }

    pub fn reset(&mut self, count: usize) {
        self.count = count;
    }

    /// Badge text: empty when nothing is unread, `9+` past the limit.
    pub fn badge_label(&self) -> String {
        match self.count {
            0 => String::new(),
            n if n > BADGE_LIMIT => format!("{}+", BADGE_LIMIT),
            n => n.to_string(),
        }
    }
}
