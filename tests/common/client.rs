//! Feed clients wired to a fake site

use super::constants::*;
use super::server::TestSite;
use notification_feed::client::{
    notifications_socket_url, ApiSettings, HttpNotificationApi, PushChannel,
};
use notification_feed::notifications::{FeedEngine, FeedEvent, FeedSettings};
use notification_feed::session::{FeedHandle, FeedSession};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// REST client authenticated with the test session cookie.
pub fn authenticated_api(site: &TestSite) -> HttpNotificationApi {
    let mut settings = ApiSettings::new(site.base_url.clone());
    settings.cookies = vec![session_cookie()];
    HttpNotificationApi::new(settings).expect("Failed to build notifications client")
}

/// REST client without any cookie.
pub fn anonymous_api(site: &TestSite) -> HttpNotificationApi {
    HttpNotificationApi::new(ApiSettings::new(site.base_url.clone()))
        .expect("Failed to build notifications client")
}

pub fn push_channel(site: &TestSite) -> PushChannel {
    PushChannel::new(
        notifications_socket_url(&site.ws_base, TEST_USER_ID),
        Some(session_cookie()),
    )
}

/// A running feed session against `site`, with an event receiver subscribed
/// before the session starts.
pub struct TestFeed {
    pub handle: FeedHandle,
    pub events: broadcast::Receiver<FeedEvent>,
}

impl TestFeed {
    pub fn start(site: &TestSite, settings: FeedSettings, with_push: bool) -> Self {
        let push = with_push.then(|| push_channel(site));
        let (session, handle) = FeedSession::new(
            FeedEngine::new(settings),
            Arc::new(authenticated_api(site)),
            push,
        );
        let events = handle.subscribe();
        tokio::spawn(session.run());
        Self { handle, events }
    }

    /// Waits for the first event matching `predicate`, skipping others.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> FeedEvent
    where
        F: FnMut(&FeedEvent) -> bool,
    {
        let events = &mut self.events;
        tokio::time::timeout(Duration::from_millis(EVENT_TIMEOUT_MS), async {
            loop {
                match events.recv().await {
                    Ok(event) if predicate(&event) => return event,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        panic!("Feed event stream closed")
                    }
                }
            }
        })
        .await
        .expect("Timed out waiting for feed event")
    }
}

impl Drop for TestFeed {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}
