//! End-to-end tests for loading the feed and synchronizing read state

mod common;

use common::{anonymous_api, authenticated_api, TestFeed, TestSite};
use notification_feed::client::{ApiError, NotificationApi};
use notification_feed::notifications::{
    FeedEvent, FeedSettings, NotificationId, NotificationKind, ServerStatus, SyncTarget,
    MAX_FEED_SIZE,
};
use notification_feed::session::{ClickTarget, FeedSession};
use notification_feed::FeedEngine;
use serde_json::json;
use std::sync::Arc;

fn seed(site: &TestSite) {
    site.add_notification(
        1,
        json!({"type": "new_subscription", "subscriber_name": "Ana"}),
        true,
    );
    site.add_notification(
        2,
        json!({"type": "new_comment_on_video", "commenter_name": "Bo", "video_title": "Rust",
               "video_id": 8, "comment_id": 3}),
        false,
    );
    site.add_notification(
        3,
        json!({"type": "new_video", "uploader_name": "Cy", "video_title": "Tokio",
               "video_id": 9, "thumbnail_url": "https://cdn.test/9.jpg"}),
        false,
    );
}

fn ids(records: &[notification_feed::NotificationRecord]) -> Vec<NotificationId> {
    records.iter().map(|r| r.id.clone()).collect()
}

// =============================================================================
// Loading
// =============================================================================

#[tokio::test]
async fn test_initial_load_keeps_server_order() {
    let site = TestSite::spawn().await;
    seed(&site);
    let mut feed = TestFeed::start(&site, FeedSettings::default(), false);

    let event = feed
        .wait_for(|e| matches!(e, FeedEvent::FeedReloaded { .. }))
        .await;
    let FeedEvent::FeedReloaded { records } = event else {
        unreachable!()
    };
    assert_eq!(
        ids(&records),
        vec![
            NotificationId::server("3"),
            NotificationId::server("2"),
            NotificationId::server("1"),
        ]
    );

    let snapshot = feed.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.unread_count, 2);
    assert_eq!(snapshot.badge, "2");

    let video = &snapshot.records[0];
    assert_eq!(video.kind, NotificationKind::NewVideo);
    assert_eq!(video.detail, "Channel: Cy\nTitle: Tokio");
    assert_eq!(video.link.as_deref(), Some("/videos/9/"));
    assert_eq!(video.thumbnail_url.as_deref(), Some("https://cdn.test/9.jpg"));

    let comment = &snapshot.records[1];
    assert_eq!(comment.link.as_deref(), Some("/videos/8/#comment-3"));
}

#[tokio::test]
async fn test_initial_load_truncates_to_capacity() {
    let site = TestSite::spawn().await;
    for id in 1..=20 {
        site.add_notification(id, json!({"text": format!("n{}", id)}), false);
    }
    let feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    let snapshot = feed.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.records.len(), MAX_FEED_SIZE);
    assert_eq!(snapshot.records[0].id, NotificationId::server("20"));
    assert_eq!(
        snapshot.records[MAX_FEED_SIZE - 1].id,
        NotificationId::server("6")
    );
    assert_eq!(snapshot.unread_count, MAX_FEED_SIZE);
    assert_eq!(snapshot.badge, "9+");
}

#[tokio::test]
async fn test_malformed_entries_do_not_fail_the_load() {
    let site = TestSite::spawn().await;
    site.add_notification(2, json!({"text": "ok"}), false);
    site.add_raw_entry(json!({
        "id": 1,
        "message": "bad fields",
        "is_read": null,
        "timestamp": 1714557600,
    }));
    site.add_raw_entry(json!("not even an object"));
    let mut feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    let snapshot = feed.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.records.len(), 3);
    assert_eq!(snapshot.records[0].id, NotificationId::server("2"));
    assert_eq!(snapshot.records[1].id, NotificationId::server("1"));
    assert_eq!(snapshot.records[1].detail, "bad fields");
    assert!(!snapshot.records[1].is_read);
    assert!(snapshot.records[1].timestamp.is_some());
    assert!(snapshot.records[2].id.is_local());
    assert_eq!(snapshot.records[2].detail, "not even an object");
    assert_eq!(snapshot.unread_count, 3);

    while let Ok(event) = feed.events.try_recv() {
        assert!(!matches!(event, FeedEvent::LoadFailed { .. }));
    }
}

#[tokio::test]
async fn test_unauthenticated_fetch_is_rejected() {
    let site = TestSite::spawn().await;
    let result = anonymous_api(&site).fetch_notifications().await;
    assert!(matches!(
        result,
        Err(ApiError::Status { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_failed_load_keeps_feed_and_reports() {
    let site = TestSite::spawn().await;
    seed(&site);
    let (session, handle) = FeedSession::new(
        FeedEngine::new(FeedSettings::default()),
        Arc::new(anonymous_api(&site)),
        None,
    );
    let mut events = handle.subscribe();
    tokio::spawn(session.run());

    let event = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            if let Ok(event @ FeedEvent::LoadFailed { .. }) = events.recv().await {
                return event;
            }
        }
    })
    .await
    .unwrap();
    let FeedEvent::LoadFailed { reason } = event else {
        unreachable!()
    };
    assert!(reason.contains("403"));

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.records.is_empty());
    handle.shutdown();
}

#[tokio::test]
async fn test_reload_picks_up_new_notifications() {
    let site = TestSite::spawn().await;
    seed(&site);
    let feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    site.add_notification(4, json!({"text": "fresh"}), false);
    feed.handle.reload().await.unwrap();
    feed.handle.settled().await.unwrap();

    let snapshot = feed.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.records.len(), 4);
    assert_eq!(snapshot.records[0].id, NotificationId::server("4"));
    assert_eq!(snapshot.records[0].detail, "fresh");
    assert_eq!(snapshot.unread_count, 3);
}

// =============================================================================
// Read state
// =============================================================================

#[tokio::test]
async fn test_click_marks_read_on_server() {
    let site = TestSite::spawn().await;
    seed(&site);
    let feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    let target = feed
        .handle
        .click(NotificationId::server("2"))
        .await
        .unwrap();
    assert_eq!(
        target,
        Some(ClickTarget {
            link: "/videos/8/#comment-3".to_string(),
            internal: true,
        })
    );
    feed.handle.settled().await.unwrap();

    assert_eq!(site.mark_requests(), vec!["2".to_string()]);
    assert_eq!(site.is_read(2), Some(true));

    let snapshot = feed.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.unread_count, 1);
    assert_eq!(snapshot.pending, 0);
}

#[tokio::test]
async fn test_marking_read_record_sends_nothing() {
    let site = TestSite::spawn().await;
    seed(&site);
    let feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    feed.handle
        .mark_read(NotificationId::server("1"))
        .await
        .unwrap();
    feed.handle
        .mark_read(NotificationId::server("404"))
        .await
        .unwrap();
    feed.handle.settled().await.unwrap();

    assert!(site.mark_requests().is_empty());
    assert_eq!(feed.handle.snapshot().await.unwrap().unread_count, 2);
}

#[tokio::test]
async fn test_server_noop_is_not_a_failure() {
    let site = TestSite::spawn().await;
    seed(&site);
    let mut feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    // Another client reads the notification first.
    let status = authenticated_api(&site).mark_as_read("3").await.unwrap();
    assert_eq!(status, ServerStatus::Success);

    feed.handle
        .mark_read(NotificationId::server("3"))
        .await
        .unwrap();
    feed.handle.settled().await.unwrap();

    let mut saw_failure = false;
    while let Ok(event) = feed.events.try_recv() {
        if matches!(event, FeedEvent::SyncFailed { .. }) {
            saw_failure = true;
        }
    }
    assert!(!saw_failure);
    assert_eq!(feed.handle.snapshot().await.unwrap().unread_count, 1);
}

#[tokio::test]
async fn test_failed_mark_keeps_optimistic_state() {
    let site = TestSite::spawn().await;
    seed(&site);
    site.fail_marks();
    let mut feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    feed.handle
        .mark_read(NotificationId::server("3"))
        .await
        .unwrap();
    let event = feed
        .wait_for(|e| matches!(e, FeedEvent::SyncFailed { .. }))
        .await;
    let FeedEvent::SyncFailed { target, reason } = event else {
        unreachable!()
    };
    assert_eq!(target, SyncTarget::One(NotificationId::server("3")));
    assert!(reason.contains("500"));

    // Local state is not rolled back; the server still has it unread.
    let snapshot = feed.handle.snapshot().await.unwrap();
    assert!(snapshot.records[0].is_read);
    assert_eq!(snapshot.unread_count, 1);
    assert_eq!(site.is_read(3), Some(false));
}

#[tokio::test]
async fn test_missing_csrf_cookie_fails_sync() {
    let site = TestSite::spawn().await;
    seed(&site);
    site.withhold_csrf_cookie();
    let mut feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    feed.handle
        .mark_read(NotificationId::server("2"))
        .await
        .unwrap();
    let event = feed
        .wait_for(|e| matches!(e, FeedEvent::SyncFailed { .. }))
        .await;
    let FeedEvent::SyncFailed { reason, .. } = event else {
        unreachable!()
    };
    assert!(reason.contains("CSRF"));
    assert!(site.mark_requests().is_empty());
}

#[tokio::test]
async fn test_open_feed_marks_all_read() {
    let site = TestSite::spawn().await;
    seed(&site);
    let mut feed = TestFeed::start(&site, FeedSettings::default(), false);
    feed.handle.settled().await.unwrap();

    feed.handle.open_feed().await.unwrap();
    feed.wait_for(|e| matches!(e, FeedEvent::UnreadCountChanged { count: 0 }))
        .await;
    feed.handle.settled().await.unwrap();

    assert_eq!(site.mark_all_requests(), 1);
    assert_eq!(site.is_read(2), Some(true));
    assert_eq!(site.is_read(3), Some(true));

    let snapshot = feed.handle.snapshot().await.unwrap();
    assert!(snapshot.records.iter().all(|r| r.is_read));
    assert_eq!(snapshot.badge, "");
}

#[tokio::test]
async fn test_direct_api_round_trip() {
    let site = TestSite::spawn().await;
    seed(&site);
    let api = authenticated_api(&site);

    let notifications = api.fetch_notifications().await.unwrap();
    assert_eq!(notifications.len(), 3);
    assert!(!notifications[0].is_read);

    assert_eq!(api.mark_as_read("3").await.unwrap(), ServerStatus::Success);
    assert_eq!(api.mark_as_read("3").await.unwrap(), ServerStatus::Noop);
    assert_eq!(api.mark_all_as_read().await.unwrap(), ServerStatus::Success);
    assert_eq!(api.mark_all_as_read().await.unwrap(), ServerStatus::Noop);

    let result = api.mark_as_read("999").await;
    assert!(matches!(
        result,
        Err(ApiError::Status { status: 404, .. })
    ));
}
