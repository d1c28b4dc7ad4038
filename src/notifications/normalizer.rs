//! Payload normalization.
//!
//! Turns both raw input shapes into a [`NotificationRecord`]. Normalization
//! never fails: malformed messages degrade to plain-text notifications.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::link::resolve_link;
use super::models::{
    HistoricalInput, LiveInput, NotificationId, NotificationKind, NotificationRecord,
    RawNotification,
};

pub const DEFAULT_TITLE: &str = "Notification";
pub const UNREADABLE_DETAIL: &str = "Unable to display notification content.";
const MISSING: &str = "N/A";

static NO_PAYLOAD: Value = Value::Null;

/// Message body after decoding.
#[derive(Debug, Clone, PartialEq)]
enum Body {
    /// A JSON object (or array) carrying type-specific fields.
    Structured(Value),
    /// Text that is not structured data, shown verbatim.
    Plain(String),
    /// Anything else (null, numbers, booleans).
    Unreadable,
}

impl Body {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(decoded @ (Value::Object(_) | Value::Array(_))) => Body::Structured(decoded),
                Ok(_) => Body::Plain(text),
                Err(e) => {
                    debug!("Notification message is not structured ({}), using plain text", e);
                    Body::Plain(text)
                }
            },
            Value::Object(_) | Value::Array(_) => Body::Structured(value),
            _ => Body::Unreadable,
        }
    }

    fn payload(&self) -> &Value {
        match self {
            Body::Structured(value) => value,
            _ => &NO_PAYLOAD,
        }
    }

    fn embedded_kind(&self) -> Option<String> {
        let payload = self.payload();
        text_field(payload, "type").or_else(|| text_field(payload, "kind"))
    }
}

/// Converts raw notifications into canonical records.
///
/// Holds the generator for local ids, which are time based and strictly
/// increasing for the lifetime of the normalizer.
#[derive(Debug, Default)]
pub struct Normalizer {
    last_local_id: u64,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, raw: RawNotification, now: DateTime<Utc>) -> NotificationRecord {
        match raw {
            RawNotification::Live(input) => self.normalize_live(input, now),
            RawNotification::Historical(input) => self.normalize_historical(input, now),
        }
    }

    fn normalize_live(&mut self, input: LiveInput, now: DateTime<Utc>) -> NotificationRecord {
        let envelope_kind = input.kind.filter(|k| !k.trim().is_empty());
        let body = Body::from_value(input.payload);
        let server_id = text_field(body.payload(), "id");
        let id = self.resolve_id(server_id, now);

        // A push notification is always new at arrival.
        self.build(id, envelope_kind, body, None, false, Some(now))
    }

    fn normalize_historical(
        &mut self,
        input: HistoricalInput,
        now: DateTime<Utc>,
    ) -> NotificationRecord {
        let server_id = input
            .id
            .map(|id| id.into_string())
            .filter(|id| !id.is_empty());
        let id = self.resolve_id(server_id, now);
        let body = Body::from_value(input.message);
        let timestamp = input.timestamp.as_deref().and_then(parse_timestamp);

        self.build(id, None, body, input.link.as_deref(), input.is_read, timestamp)
    }

    fn build(
        &self,
        id: NotificationId,
        envelope_kind: Option<String>,
        body: Body,
        explicit_link: Option<&str>,
        is_read: bool,
        timestamp: Option<DateTime<Utc>>,
    ) -> NotificationRecord {
        let kind = envelope_kind
            .or_else(|| body.embedded_kind())
            .map(|tag| NotificationKind::from_tag(&tag))
            .unwrap_or(NotificationKind::Generic);

        let payload = body.payload();
        let link = resolve_link(kind, payload, explicit_link);
        let thumbnail_url = match kind {
            NotificationKind::NewVideo => text_field(payload, "thumbnail_url"),
            _ => None,
        };

        let (title, detail) = match &body {
            Body::Structured(payload) => compose_text(kind, payload),
            Body::Plain(text) => (DEFAULT_TITLE.to_string(), text.clone()),
            Body::Unreadable => (DEFAULT_TITLE.to_string(), UNREADABLE_DETAIL.to_string()),
        };

        NotificationRecord {
            id,
            kind,
            title,
            detail,
            link,
            thumbnail_url,
            is_read,
            timestamp,
        }
    }

    fn resolve_id(&mut self, server_id: Option<String>, now: DateTime<Utc>) -> NotificationId {
        match server_id {
            Some(id) => NotificationId::Server(id),
            None => NotificationId::Local(self.next_local_id(now)),
        }
    }

    fn next_local_id(&mut self, now: DateTime<Utc>) -> u64 {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let next = millis.max(self.last_local_id + 1);
        self.last_local_id = next;
        next
    }
}

/// Title and detail lookup keyed by kind.
fn compose_text(kind: NotificationKind, payload: &Value) -> (String, String) {
    let field = |name: &str| text_field(payload, name).unwrap_or_else(|| MISSING.to_string());
    let content = || text_field(payload, "comment_content").unwrap_or_default();

    match kind {
        NotificationKind::NewVideo => (
            "New video published!".to_string(),
            format!(
                "Channel: {}\nTitle: {}",
                field("uploader_name"),
                field("video_title")
            ),
        ),
        NotificationKind::NewReply => (
            "New reply to your comment!".to_string(),
            format!(
                "From: {}\nVideo: {}\nReply: \"{}\"",
                field("replier_name"),
                field("video_title"),
                content()
            ),
        ),
        NotificationKind::NewCommentOnVideo => (
            "New comment on your video!".to_string(),
            format!(
                "From: {}\nVideo: {}\nComment: \"{}\"",
                field("commenter_name"),
                field("video_title"),
                content()
            ),
        ),
        NotificationKind::NewSubscription => (
            "New subscriber!".to_string(),
            format!("{} subscribed to your channel", field("subscriber_name")),
        ),
        NotificationKind::Generic => (
            text_field(payload, "title").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            text_field(payload, "text").unwrap_or_else(|| payload.to_string()),
        ),
    }
}

/// Read a scalar payload field as display text.
///
/// Accepts the snake_case name or its camelCase spelling. Empty strings and
/// non-scalar values count as missing.
pub(crate) fn text_field(payload: &Value, name: &str) -> Option<String> {
    let object = payload.as_object()?;
    let value = object.get(name).or_else(|| object.get(&camel_case(name)))?;
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
