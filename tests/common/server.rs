//! Fake server of record
//!
//! Serves the notifications REST endpoints and the per-user push socket from
//! an in-process axum app bound to a random port. Each test gets its own
//! isolated site.

use super::constants::*;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// A notification as stored by the fake site.
#[derive(Debug, Clone)]
pub struct StoredNotification {
    pub id: u64,
    /// Encoded payload, as the site stores it.
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub timestamp: String,
}

/// Frames the site sends down the push socket.
#[derive(Debug, Clone)]
pub enum PushFrame {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Default)]
struct SiteData {
    /// Newest first.
    notifications: Vec<StoredNotification>,
    /// Served verbatim after the stored notifications.
    raw_entries: Vec<Value>,
    mark_requests: Vec<String>,
    mark_all_requests: usize,
    fail_marks: bool,
    set_csrf_cookie: bool,
    push_user_ids: Vec<String>,
    push_cookies: Vec<Option<String>>,
}

#[derive(Clone)]
struct SiteState {
    data: Arc<Mutex<SiteData>>,
    push_tx: broadcast::Sender<PushFrame>,
}

/// Fake site instance. When dropped, the server shuts down.
pub struct TestSite {
    /// Base URL for REST requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Base URL for the push socket (e.g., "ws://127.0.0.1:12345")
    pub ws_base: String,

    state: SiteState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestSite {
    /// Spawns a new fake site on a random port
    pub async fn spawn() -> Self {
        let (push_tx, _) = broadcast::channel(64);
        let state = SiteState {
            data: Arc::new(Mutex::new(SiteData {
                set_csrf_cookie: true,
                ..Default::default()
            })),
            push_tx,
        };

        let app = Router::new()
            .route("/notifications/", get(list_notifications))
            .route("/notifications/mark-all-as-read/", post(mark_all_as_read))
            .route("/notifications/{id}/mark-as-read/", post(mark_as_read))
            .route("/ws/notifications/{user_id}/", get(push_socket))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            ws_base: format!("ws://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Store a notification at the head of the site's list.
    pub fn add_notification(&self, id: u64, payload: Value, is_read: bool) {
        self.add_raw_notification(StoredNotification {
            id,
            message: payload.to_string(),
            link: None,
            is_read,
            timestamp: "2024-05-01T10:00:00Z".to_string(),
        });
    }

    pub fn add_raw_notification(&self, notification: StoredNotification) {
        let mut data = self.state.data.lock().unwrap();
        data.notifications.insert(0, notification);
    }

    /// Append an entry to the list exactly as given, malformed or not.
    pub fn add_raw_entry(&self, entry: Value) {
        self.state.data.lock().unwrap().raw_entries.push(entry);
    }

    pub fn is_read(&self, id: u64) -> Option<bool> {
        let data = self.state.data.lock().unwrap();
        data.notifications
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.is_read)
    }

    pub fn mark_requests(&self) -> Vec<String> {
        self.state.data.lock().unwrap().mark_requests.clone()
    }

    pub fn mark_all_requests(&self) -> usize {
        self.state.data.lock().unwrap().mark_all_requests
    }

    /// Make every mark-as-read request fail with a 500.
    pub fn fail_marks(&self) {
        self.state.data.lock().unwrap().fail_marks = true;
    }

    /// Stop handing out the CSRF cookie.
    pub fn withhold_csrf_cookie(&self) {
        self.state.data.lock().unwrap().set_csrf_cookie = false;
    }

    pub fn push_user_ids(&self) -> Vec<String> {
        self.state.data.lock().unwrap().push_user_ids.clone()
    }

    pub fn push_cookies(&self) -> Vec<Option<String>> {
        self.state.data.lock().unwrap().push_cookies.clone()
    }

    /// Send a text frame to every connected push socket.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.state.push_tx.send(PushFrame::Text(frame.into()));
    }

    /// Close every connected push socket.
    pub fn close_push(&self, code: u16, reason: &str) {
        let _ = self.state.push_tx.send(PushFrame::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Waits until `count` push sockets are connected.
    pub async fn wait_for_push_connections(&self, count: usize) {
        let start = std::time::Instant::now();
        while self.state.push_tx.receiver_count() < count {
            if start.elapsed() > Duration::from_millis(EVENT_TIMEOUT_MS) {
                panic!("Push socket did not connect within {}ms", EVENT_TIMEOUT_MS);
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}

impl Drop for TestSite {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn has_session(headers: &HeaderMap) -> bool {
    cookie(headers, SESSION_COOKIE_NAME).as_deref() == Some(SESSION_COOKIE_VALUE)
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

fn csrf_ok(headers: &HeaderMap) -> bool {
    let header_token = headers.get("X-CSRFToken").and_then(|v| v.to_str().ok());
    header_token == Some(TEST_CSRF_TOKEN)
}

fn forbidden(reason: &str) -> Response {
    (StatusCode::FORBIDDEN, reason.to_string()).into_response()
}

async fn list_notifications(State(state): State<SiteState>, headers: HeaderMap) -> Response {
    if !has_session(&headers) {
        return forbidden("Authentication required");
    }
    let data = state.data.lock().unwrap();
    let notifications: Vec<Value> = data
        .notifications
        .iter()
        .map(|n| {
            json!({
                "id": n.id,
                "message": n.message,
                "link": n.link,
                "is_read": n.is_read,
                "timestamp": n.timestamp,
            })
        })
        .chain(data.raw_entries.iter().cloned())
        .collect();

    let mut response = Json(json!({ "notifications": notifications })).into_response();
    if data.set_csrf_cookie {
        response.headers_mut().insert(
            header::SET_COOKIE,
            format!("csrftoken={}; Path=/", TEST_CSRF_TOKEN)
                .parse()
                .unwrap(),
        );
    }
    response
}

async fn mark_as_read(
    State(state): State<SiteState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !has_session(&headers) {
        return forbidden("Authentication required");
    }
    if !csrf_ok(&headers) {
        return forbidden("CSRF verification failed");
    }
    let mut data = state.data.lock().unwrap();
    data.mark_requests.push(id.clone());
    if data.fail_marks {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let Some(notification) = data
        .notifications
        .iter_mut()
        .find(|n| n.id.to_string() == id)
    else {
        return (StatusCode::NOT_FOUND, "Notification not found").into_response();
    };
    if notification.is_read {
        return Json(json!({"status": "noop", "message": "Already read"})).into_response();
    }
    notification.is_read = true;
    Json(json!({"status": "success"})).into_response()
}

async fn mark_all_as_read(State(state): State<SiteState>, headers: HeaderMap) -> Response {
    if !has_session(&headers) {
        return forbidden("Authentication required");
    }
    if !csrf_ok(&headers) {
        return forbidden("CSRF verification failed");
    }
    let mut data = state.data.lock().unwrap();
    data.mark_all_requests += 1;
    let mut changed = 0;
    for notification in data.notifications.iter_mut().filter(|n| !n.is_read) {
        notification.is_read = true;
        changed += 1;
    }
    let status = if changed > 0 { "success" } else { "noop" };
    Json(json!({ "status": status })).into_response()
}

async fn push_socket(
    ws: WebSocketUpgrade,
    State(state): State<SiteState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    {
        let mut data = state.data.lock().unwrap();
        data.push_user_ids.push(user_id);
        data.push_cookies.push(
            headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        );
    }
    let frames = state.push_tx.subscribe();
    ws.on_upgrade(move |socket| forward_frames(socket, frames))
}

async fn forward_frames(socket: WebSocket, mut frames: broadcast::Receiver<PushFrame>) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(PushFrame::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(PushFrame::Close { code, reason }) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
                Err(_) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
