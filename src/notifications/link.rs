//! Navigation target resolution.

use serde_json::Value;

use super::models::{NotificationKind, NO_LINK};
use super::normalizer::text_field;

/// Resolve the link for a notification.
///
/// Precedence, highest first:
/// 1. the explicit link carried by the raw notification (unless empty or `#`)
/// 2. a `url` field in the payload
/// 3. `/videos/{video_id}/`, anchored to the parent comment or, failing that,
///    to the comment
/// 4. no link
///
/// The kind does not take part in the precedence today, every kind shares the
/// same rules.
pub fn resolve_link(
    _kind: NotificationKind,
    payload: &Value,
    explicit_link: Option<&str>,
) -> Option<String> {
    if let Some(link) = explicit_link.map(str::trim).filter(|l| is_target(l)) {
        return Some(link.to_string());
    }

    if let Some(url) = text_field(payload, "url").filter(|u| is_target(u)) {
        return Some(url);
    }

    let video_id = text_field(payload, "video_id")?;
    let mut link = format!("/videos/{}/", video_id);
    if let Some(comment) =
        text_field(payload, "parent_comment_id").or_else(|| text_field(payload, "comment_id"))
    {
        link.push_str("#comment-");
        link.push_str(&comment);
    }
    Some(link)
}

fn is_target(link: &str) -> bool {
    !link.is_empty() && link != NO_LINK
}
