//! Drives a [`FeedEngine`] against the server of record.
//!
//! One task owns the engine and multiplexes push events, user commands and
//! completions of REST calls. Every engine mutation happens on that task.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::client::{ApiError, NotificationApi, PushChannel, PushEvent};
use crate::notifications::{
    FeedEngine, FeedEvent, HistoricalInput, MarkReadIntent, NotificationId, NotificationRecord,
    ServerStatus,
};

const COMMAND_CHANNEL_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Feed session is not running")]
    Stopped,
}

/// Where a clicked notification leads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    pub link: String,
    /// Site-relative link, navigated in place rather than opened externally.
    pub internal: bool,
}

impl ClickTarget {
    fn from_link(link: &str) -> Self {
        Self {
            link: link.to_string(),
            internal: link.starts_with('/'),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub records: Vec<NotificationRecord>,
    pub unread_count: usize,
    pub badge: String,
    pub pending: usize,
    pub push_open: bool,
}

/// Command sent to the session.
pub enum FeedCommand {
    Reload,
    /// The user opened the feed: everything becomes read.
    OpenFeed,
    MarkRead {
        id: NotificationId,
    },
    Click {
        id: NotificationId,
        response: oneshot::Sender<Option<ClickTarget>>,
    },
    Snapshot {
        response: oneshot::Sender<FeedSnapshot>,
    },
    /// Answered once no request is in flight.
    Settled {
        response: oneshot::Sender<()>,
    },
}

enum Completion {
    Reload(Result<Vec<HistoricalInput>, ApiError>),
    MarkRead {
        id: NotificationId,
        result: Result<ServerStatus, ApiError>,
    },
    MarkAllRead(Result<ServerStatus, ApiError>),
}

/// Handle to interact with a running [`FeedSession`].
#[derive(Clone)]
pub struct FeedHandle {
    command_tx: mpsc::Sender<FeedCommand>,
    events: broadcast::Sender<FeedEvent>,
    shutdown: CancellationToken,
}

impl FeedHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub async fn reload(&self) -> Result<(), SessionError> {
        self.send(FeedCommand::Reload).await
    }

    pub async fn open_feed(&self) -> Result<(), SessionError> {
        self.send(FeedCommand::OpenFeed).await
    }

    pub async fn mark_read(&self, id: NotificationId) -> Result<(), SessionError> {
        self.send(FeedCommand::MarkRead { id }).await
    }

    /// Click a record: unread records are marked read, and the link to
    /// follow is returned if there is one.
    pub async fn click(&self, id: NotificationId) -> Result<Option<ClickTarget>, SessionError> {
        let (response, rx) = oneshot::channel();
        self.send(FeedCommand::Click { id, response }).await?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    pub async fn snapshot(&self) -> Result<FeedSnapshot, SessionError> {
        let (response, rx) = oneshot::channel();
        self.send(FeedCommand::Snapshot { response }).await?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// Wait until every request issued so far has completed.
    pub async fn settled(&self) -> Result<(), SessionError> {
        let (response, rx) = oneshot::channel();
        self.send(FeedCommand::Settled { response }).await?;
        rx.await.map_err(|_| SessionError::Stopped)
    }

    /// Stop the session and close the push channel.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, command: FeedCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::Stopped)
    }
}

pub struct FeedSession {
    engine: FeedEngine,
    api: Arc<dyn NotificationApi>,
    push: Option<PushChannel>,
    push_open: bool,
    tasks: JoinSet<Completion>,
    settled_waiters: Vec<oneshot::Sender<()>>,
    command_rx: mpsc::Receiver<FeedCommand>,
    shutdown: CancellationToken,
}

impl FeedSession {
    pub fn new(
        engine: FeedEngine,
        api: Arc<dyn NotificationApi>,
        push: Option<PushChannel>,
    ) -> (Self, FeedHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let shutdown = CancellationToken::new();
        let handle = FeedHandle {
            command_tx,
            events: engine.event_sender(),
            shutdown: shutdown.clone(),
        };
        let session = Self {
            engine,
            api,
            push,
            push_open: false,
            tasks: JoinSet::new(),
            settled_waiters: Vec::new(),
            command_rx,
            shutdown,
        };
        (session, handle)
    }

    /// Load history, open the push channel and process events until shutdown
    /// or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Starting notification feed session");

        let (push_handle, mut push_rx) = match self.push.take() {
            Some(channel) => {
                let (handle, rx) = channel.spawn();
                (Some(handle), Some(rx))
            }
            None => (None, None),
        };

        self.start_reload();

        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Feed session received shutdown signal");
                    break;
                }
                event = next_push_event(&mut push_rx) => match event {
                    Some(event) => self.handle_push(event),
                    None => push_rx = None,
                },
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All feed handles dropped");
                        break;
                    }
                },
                Some(joined) = self.tasks.join_next() => self.handle_completion(joined),
            }
            self.notify_settled();
        }

        if let Some(handle) = push_handle {
            handle.close().await;
        }
        // In-flight requests are not cancellable; let them finish unobserved.
        self.tasks.detach_all();
        info!("Notification feed session stopped");
    }

    fn handle_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::Opened => {
                self.push_open = true;
            }
            PushEvent::Notification(input) => {
                let id = self.engine.ingest_live(input);
                debug!("Live notification {} inserted", id);
            }
            PushEvent::Closed(e) => {
                self.push_open = false;
                self.engine.report_transport_failure(e.to_string());
            }
        }
    }

    fn handle_command(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::Reload => self.start_reload(),
            FeedCommand::OpenFeed => self.mark_all_read(),
            FeedCommand::MarkRead { id } => self.mark_read(id),
            FeedCommand::Click { id, response } => {
                let target = self.click(id);
                let _ = response.send(target);
            }
            FeedCommand::Snapshot { response } => {
                let _ = response.send(self.snapshot());
            }
            FeedCommand::Settled { response } => self.settled_waiters.push(response),
        }
    }

    fn handle_completion(&mut self, joined: Result<Completion, JoinError>) {
        let completion = match joined {
            Ok(completion) => completion,
            Err(e) => {
                error!("Feed request task failed: {}", e);
                return;
            }
        };
        match completion {
            Completion::Reload(Ok(inputs)) => self.engine.load_historical(inputs),
            Completion::Reload(Err(e)) => self.engine.load_failed(e.to_string()),
            Completion::MarkRead { id, result } => {
                self.engine.complete_mark_read(&id, result);
            }
            Completion::MarkAllRead(result) => {
                self.engine.complete_mark_all_read(result);
            }
        }
    }

    fn start_reload(&mut self) {
        if self.engine.is_reloading() {
            debug!("Historical reload already in flight");
            return;
        }
        self.engine.begin_reload();
        let api = self.api.clone();
        self.tasks
            .spawn(async move { Completion::Reload(api.fetch_notifications().await) });
    }

    fn mark_read(&mut self, id: NotificationId) {
        match self.engine.begin_mark_read(&id) {
            MarkReadIntent::Send(server_id) => {
                let api = self.api.clone();
                self.tasks.spawn(async move {
                    let result = api.mark_as_read(&server_id).await;
                    Completion::MarkRead { id, result }
                });
            }
            MarkReadIntent::LocalOnly => debug!("{} marked read locally", id),
            MarkReadIntent::AlreadyRead | MarkReadIntent::NotFound => {}
        }
    }

    fn mark_all_read(&mut self) {
        let changed = self.engine.begin_mark_all_read();
        debug!("Feed opened, {} notifications marked read", changed);
        let api = self.api.clone();
        self.tasks
            .spawn(async move { Completion::MarkAllRead(api.mark_all_as_read().await) });
    }

    fn click(&mut self, id: NotificationId) -> Option<ClickTarget> {
        let record = self.engine.get(&id)?;
        let target = record.link.as_deref().map(ClickTarget::from_link);
        if !record.is_read {
            self.mark_read(id);
        }
        target
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            records: self.engine.snapshot(),
            unread_count: self.engine.unread_count(),
            badge: self.engine.badge_label(),
            pending: self.engine.pending_count(),
            push_open: self.push_open,
        }
    }

    fn notify_settled(&mut self) {
        if !self.tasks.is_empty() {
            return;
        }
        for waiter in self.settled_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

async fn next_push_event(rx: &mut Option<mpsc::Receiver<PushEvent>>) -> Option<PushEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
