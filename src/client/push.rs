//! WebSocket push channel.
//!
//! Connects once, forwards every text frame as a [`LiveInput`] in arrival
//! order and reports the close. The channel is never reopened.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::error::PushError;
use crate::notifications::LiveInput;

const PUSH_CHANNEL_SIZE: usize = 64;
/// Close code for a connection that ended without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code for a close frame that carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

#[derive(Debug)]
pub enum PushEvent {
    Opened,
    Notification(LiveInput),
    /// Terminal. No event follows.
    Closed(PushError),
}

/// Derive the websocket base from an HTTP base URL.
pub fn websocket_base(base_url: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("https://") {
        Some(format!("wss://{}", rest))
    } else if let Some(rest) = base.strip_prefix("http://") {
        Some(format!("ws://{}", rest))
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        Some(base.to_string())
    } else {
        None
    }
}

/// Per-user notifications socket under a websocket base.
pub fn notifications_socket_url(ws_base: &str, user_id: &str) -> String {
    format!(
        "{}/ws/notifications/{}/",
        ws_base.trim_end_matches('/'),
        urlencoding::encode(user_id)
    )
}

pub struct PushChannel {
    url: String,
    cookie: Option<String>,
}

impl PushChannel {
    pub fn new(url: impl Into<String>, cookie: Option<String>) -> Self {
        Self {
            url: url.into(),
            cookie,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection task.
    pub fn spawn(self) -> (PushHandle, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(PUSH_CHANNEL_SIZE);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(tx, shutdown_rx));
        let handle = PushHandle {
            shutdown: Some(shutdown_tx),
            task,
        };
        (handle, rx)
    }

    async fn run(self, tx: mpsc::Sender<PushEvent>, mut shutdown: oneshot::Receiver<()>) {
        info!("Connecting to notification push channel: {}", self.url);

        let request = match self.request() {
            Ok(request) => request,
            Err(e) => {
                let _ = tx.send(PushEvent::Closed(e)).await;
                return;
            }
        };

        let ws_stream = tokio::select! {
            _ = &mut shutdown => return,
            connected = connect_async(request) => match connected {
                Ok((ws_stream, _)) => ws_stream,
                Err(e) => {
                    let _ = tx
                        .send(PushEvent::Closed(PushError::Connect(e.to_string())))
                        .await;
                    return;
                }
            },
        };

        info!("Connected to notification push channel");
        if tx.send(PushEvent::Opened).await.is_err() {
            return;
        }

        let (mut write, mut read) = ws_stream.split();

        let error = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Closing notification push channel");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!("Failed to send close frame: {}", e);
                    }
                    return;
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let input = parse_frame(text.as_str());
                        if tx.send(PushEvent::Notification(input)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            break PushError::Protocol(format!("failed to send pong: {}", e));
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => {
                                (u16::from(frame.code), frame.reason.as_str().to_string())
                            }
                            None => (NO_STATUS_RECEIVED, String::new()),
                        };
                        break PushError::Closed { code, reason };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break PushError::Protocol(e.to_string()),
                    None => {
                        break PushError::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "connection dropped".to_string(),
                        }
                    }
                },
            }
        };

        warn!("Notification push channel ended: {}", error);
        let _ = tx.send(PushEvent::Closed(error)).await;
    }

    fn request(
        &self,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, PushError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| PushError::Connect(e.to_string()))?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| PushError::Connect(format!("invalid cookie header: {}", e)))?;
            request.headers_mut().insert(COOKIE, value);
        }
        Ok(request)
    }
}

/// Owner side of a running push channel.
pub struct PushHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PushHandle {
    /// Send a close frame and wait for the connection task to finish.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            debug!("Push channel task ended abnormally: {}", e);
        }
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Map one text frame onto a live input.
///
/// Envelopes (`message`/`payload` present) keep their kind. Any other JSON
/// object is treated as the payload itself. Everything else is carried as
/// plain text.
fn parse_frame(text: &str) -> LiveInput {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => {
            let is_envelope = map.contains_key("message") || map.contains_key("payload");
            let object = Value::Object(map);
            if is_envelope {
                if let Ok(input) = serde_json::from_value::<LiveInput>(object.clone()) {
                    return input;
                }
                debug!("Push frame has an unexpected envelope, using it as payload");
            }
            LiveInput {
                kind: None,
                payload: object,
            }
        }
        Ok(Value::String(s)) => LiveInput {
            kind: None,
            payload: Value::String(s),
        },
        _ => LiveInput {
            kind: None,
            payload: Value::String(text.to_string()),
        },
    }
}
