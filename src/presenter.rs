//! Terminal rendering of the feed.
//!
//! The presenter only reads records and [`FeedEvent`]s; it never mutates the
//! feed.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::warn;

use crate::cli_style::{
    box_chars, colors, flush, pad_to_width, section_footer, section_header, truncate_to_width,
    Painter,
};
use crate::notifications::age::format_age;
use crate::notifications::{FeedEvent, NotificationRecord, UnreadCounter};

const TITLE_WIDTH: usize = 36;
const DETAIL_WIDTH: usize = 72;

pub struct TerminalPresenter {
    painter: Painter,
}

impl TerminalPresenter {
    pub fn new(color: bool) -> Self {
        Self {
            painter: Painter::new(color),
        }
    }

    /// Header line with the unread badge.
    pub fn render_header(&self, unread: usize) -> String {
        let badge = UnreadCounter::with_count(unread).badge_label();
        let title = if badge.is_empty() {
            "Notifications".to_string()
        } else {
            format!("Notifications ({})", badge)
        };
        section_header(self.painter, &title)
    }

    pub fn render_record(&self, record: &NotificationRecord, now: DateTime<Utc>) -> String {
        let p = self.painter;
        let (marker, title) = if record.is_read {
            (
                p.paint(box_chars::BULLET_EMPTY, colors::DIM),
                p.paint(
                    &pad_to_width(&truncate_to_width(&record.title, TITLE_WIDTH), TITLE_WIDTH),
                    colors::DIM,
                ),
            )
        } else {
            (
                p.bold(box_chars::BULLET, colors::MAGENTA),
                p.bold(
                    &pad_to_width(&truncate_to_width(&record.title, TITLE_WIDTH), TITLE_WIDTH),
                    colors::WHITE,
                ),
            )
        };

        let mut out = format!(
            " {} {} {} {}",
            marker,
            title,
            p.paint(&format!("[{}]", record.id), colors::PURPLE),
            p.paint(&format_age(record.timestamp, now), colors::DIM),
        );
        for line in record.detail.lines() {
            out.push_str("\n     ");
            out.push_str(&truncate_to_width(line, DETAIL_WIDTH));
        }
        if let Some(thumbnail) = &record.thumbnail_url {
            out.push_str("\n     ");
            out.push_str(&p.paint(&format!("thumbnail: {}", thumbnail), colors::DIM));
        }
        if let Some(link) = &record.link {
            let label = if record.has_internal_link() {
                link.clone()
            } else {
                format!("{} (external)", link)
            };
            out.push_str("\n     ");
            out.push_str(&p.paint(box_chars::ARROW_RIGHT, colors::CYAN));
            out.push(' ');
            out.push_str(&p.paint(&label, colors::CYAN));
        }
        out
    }

    pub fn render_feed(
        &self,
        records: &[NotificationRecord],
        unread: usize,
        now: DateTime<Utc>,
    ) -> String {
        let mut lines = vec![self.render_header(unread)];
        if records.is_empty() {
            lines.push(format!(
                "  {} {}",
                self.painter.paint(box_chars::BULLET_EMPTY, colors::DIM),
                self.painter.paint("No notifications", colors::DIM)
            ));
        }
        for record in records {
            lines.push(self.render_record(record, now));
        }
        lines.push(section_footer(self.painter));
        lines.join("\n")
    }

    /// One line per event; `None` for events that only matter to the badge.
    pub fn render_event(&self, event: &FeedEvent, now: DateTime<Utc>) -> Option<String> {
        let p = self.painter;
        match event {
            FeedEvent::RecordInserted { record, .. } => Some(self.render_record(record, now)),
            FeedEvent::RecordEvicted { .. } => None,
            FeedEvent::RecordReadStateChanged { id, is_read } => Some(format!(
                " {} {} marked {}",
                p.paint(box_chars::CHECK, colors::GREEN),
                id,
                if *is_read { "read" } else { "unread" }
            )),
            FeedEvent::FeedReloaded { records } => {
                let unread = records.iter().filter(|r| !r.is_read).count();
                Some(self.render_feed(records, unread, now))
            }
            FeedEvent::UnreadCountChanged { count } => {
                let badge = UnreadCounter::with_count(*count).badge_label();
                let badge = if badge.is_empty() {
                    "no unread notifications".to_string()
                } else {
                    format!("{} unread", badge)
                };
                Some(format!(" {} {}", p.paint(box_chars::BULLET, colors::ORANGE), badge))
            }
            FeedEvent::SyncFailed { target, reason } => Some(format!(
                " {} Could not mark {} as read: {}",
                p.bold(box_chars::CROSS_MARK, colors::RED),
                target,
                reason
            )),
            FeedEvent::TransportFailed { reason } => Some(format!(
                " {} Live updates stopped: {}",
                p.bold(box_chars::CROSS_MARK, colors::RED),
                reason
            )),
            FeedEvent::LoadFailed { reason } => Some(format!(
                " {} Could not load notifications: {}",
                p.bold(box_chars::CROSS_MARK, colors::RED),
                reason
            )),
        }
    }

    /// Print events until the feed goes away.
    pub async fn run(self, mut events: broadcast::Receiver<FeedEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(text) = self.render_event(&event, Utc::now()) {
                        println!("{}", text);
                        flush();
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Presenter lagged behind, skipped {} feed events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
