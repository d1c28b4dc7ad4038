//! Notification data models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// Prefix reserved for client-synthesized notification ids.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Sentinel link value meaning "no navigation target".
pub const NO_LINK: &str = "#";

/// Notification type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewVideo,
    NewReply,
    NewCommentOnVideo,
    NewSubscription,
    #[serde(rename = "generic_notification")]
    Generic,
}

impl NotificationKind {
    /// Map a wire tag to a kind. Unknown tags are `Generic`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "new_video" => NotificationKind::NewVideo,
            "new_reply" => NotificationKind::NewReply,
            "new_comment_on_video" => NotificationKind::NewCommentOnVideo,
            "new_subscription" => NotificationKind::NewSubscription,
            _ => NotificationKind::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewVideo => "new_video",
            NotificationKind::NewReply => "new_reply",
            NotificationKind::NewCommentOnVideo => "new_comment_on_video",
            NotificationKind::NewSubscription => "new_subscription",
            NotificationKind::Generic => "generic_notification",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a notification in the feed.
///
/// Server ids and locally synthesized ids live in disjoint namespaces: a
/// `Local` id always renders with [`LOCAL_ID_PREFIX`] and is never sent to the
/// server of record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationId {
    Server(String),
    Local(u64),
}

impl NotificationId {
    pub fn server(id: impl Into<String>) -> Self {
        NotificationId::Server(id.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, NotificationId::Local(_))
    }

    /// The id as the server knows it, if it has one.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            NotificationId::Server(id) => Some(id),
            NotificationId::Local(_) => None,
        }
    }

    /// Parse a user supplied id (e.g. from the command line).
    pub fn parse(s: &str) -> Self {
        match s
            .strip_prefix(LOCAL_ID_PREFIX)
            .and_then(|rest| rest.parse::<u64>().ok())
        {
            Some(seq) => NotificationId::Local(seq),
            None => NotificationId::Server(s.to_string()),
        }
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationId::Server(id) => f.write_str(id),
            NotificationId::Local(seq) => write!(f, "{}{}", LOCAL_ID_PREFIX, seq),
        }
    }
}

/// The canonical notification record used downstream of ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub detail: String,
    /// `None` means the notification has no navigation target.
    pub link: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_read: bool,
    /// Display only; feed order is insertion order.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    pub fn link_or_sentinel(&self) -> &str {
        self.link.as_deref().unwrap_or(NO_LINK)
    }

    /// Internal links are site-relative paths, everything else opens externally.
    pub fn has_internal_link(&self) -> bool {
        self.link.as_deref().is_some_and(|l| l.starts_with('/'))
    }
}

/// Server-issued id as it appears on the wire (numbers or strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerId {
    Number(u64),
    Text(String),
}

impl ServerId {
    pub fn into_string(self) -> String {
        match self {
            ServerId::Number(n) => n.to_string(),
            ServerId::Text(s) => s,
        }
    }
}

/// A notification delivered over the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveInput {
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: Option<String>,
    #[serde(rename = "message", alias = "payload", default)]
    pub payload: serde_json::Value,
}

impl LiveInput {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: Some(kind.into()),
            payload,
        }
    }
}

/// A stored notification returned by the historical fetch.
///
/// `message` is usually a string which may or may not hold encoded JSON.
/// Every field deserializes leniently: a value of the wrong type counts as
/// missing, so one odd entry never rejects the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalInput {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<ServerId>,
    #[serde(default)]
    pub message: serde_json::Value,
    #[serde(default, deserialize_with = "lenient_text")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_read: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<String>,
}

impl HistoricalInput {
    /// Convert one entry of the historical list. Never fails: anything that
    /// is not an object becomes the message of an id-less notification.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => match serde_json::from_value(value.clone()) {
                Ok(input) => input,
                Err(e) => {
                    debug!(
                        "Historical notification has unexpected fields ({}), using it as message",
                        e
                    );
                    Self::from_message(value)
                }
            },
            other => Self::from_message(other),
        }
    }

    fn from_message(message: Value) -> Self {
        Self {
            id: None,
            message,
            link: None,
            is_read: false,
            timestamp: None,
        }
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<ServerId>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => Some(match n.as_u64() {
            Some(id) => ServerId::Number(id),
            None => ServerId::Text(n.to_string()),
        }),
        Value::String(s) => Some(ServerId::Text(s)),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

/// Strings are kept as is; numbers are read as unix seconds.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339()),
        _ => None,
    })
}

/// Raw input accepted by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawNotification {
    Live(LiveInput),
    Historical(HistoricalInput),
}

impl From<LiveInput> for RawNotification {
    fn from(input: LiveInput) -> Self {
        RawNotification::Live(input)
    }
}

impl From<HistoricalInput> for RawNotification {
    fn from(input: HistoricalInput) -> Self {
        RawNotification::Historical(input)
    }
}

/// Server answer to a mark-as-read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Success,
    Noop,
}
