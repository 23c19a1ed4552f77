//! Per-client push sessions and the registry that owns them

use std::{
    collections::HashMap,
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_stream::{wrappers::ReceiverStream, Stream};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} is closed")]
    SessionClosed(String),
}

/// Renders one push frame.
pub fn format_frame(event: &str, payload: &str) -> String {
    format!("event: {event}\ndata: {payload}\n\n")
}

#[derive(Debug)]
pub struct Session {
    id: String,
    opened_at: DateTime<Utc>,
    sink: Mutex<Option<mpsc::Sender<String>>>,
    closed: watch::Sender<bool>,
}

impl Session {
    fn new(sender: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            opened_at: Utc::now(),
            sink: Mutex::new(Some(sender)),
            closed: watch::Sender::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Writes one `event`/`data` frame to the client's stream.
    ///
    /// Frames from concurrent callers are serialized by the write lock, so the
    /// client sees them in lock acquisition order. A push waiting on a full
    /// buffer, or on the lock, gives up with `SessionClosed` once the session
    /// is closed.
    pub async fn send(&self, event: &str, payload: &str) -> Result<(), SessionError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(self.closed_error());
        }

        let frame = format_frame(event, payload);
        let pushed = tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => false,
            pushed = async move {
                let sink = self.sink.lock().await;
                match sink.as_ref() {
                    Some(sender) => sender.send(frame).await.is_ok(),
                    None => false,
                }
            } => pushed,
        };

        if !pushed {
            self.mark_closed();
            return Err(self.closed_error());
        }

        debug!(session_id = %self.id, event, "push frame written");
        Ok(())
    }

    /// Drops the sender so the client's stream ends after the queued frames.
    ///
    /// Pending pushes are released first, so this never waits on a client
    /// that stopped reading.
    pub async fn close(&self) {
        self.mark_closed();
        self.sink.lock().await.take();
    }

    fn mark_closed(&self) {
        self.closed.send_replace(true);
    }

    fn closed_error(&self) -> SessionError {
        SessionError::SessionClosed(self.id.clone())
    }
}

/// Live sessions by id. Insert, lookup and removal may race freely across
/// connection handlers.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh session and returns it with the stream feeding the
    /// client. Dropping the stream tears the session down.
    pub fn open(self: &Arc<Self>, buffer: usize) -> (Arc<Session>, SessionStream) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let session = Arc::new(Session::new(sender));
        self.sessions
            .write()
            .insert(session.id.clone(), Arc::clone(&session));

        info!(session_id = %session.id, live_sessions = self.len(), "session opened");

        let stream = SessionStream {
            frames: ReceiverStream::new(receiver),
            _guard: SessionGuard {
                registry: Arc::clone(self),
                session: Arc::clone(&session),
            },
        };
        (session, stream)
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, session: Arc<Session>) {
        self.sessions.write().insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Explicit termination; returns `false` for unknown ids.
    pub async fn terminate(&self, id: &str) -> bool {
        let Some(session) = self.remove(id) else {
            return false;
        };
        session.close().await;
        info!(session_id = %id, "session terminated");
        true
    }
}

/// Removes the session from its registry when the client stream goes away.
#[derive(Debug)]
struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session: Arc<Session>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.mark_closed();
        self.registry.remove(&self.session.id);

        let lifetime_secs = (Utc::now() - self.session.opened_at).num_seconds();
        info!(
            session_id = %self.session.id,
            lifetime_secs,
            "session closed"
        );
    }
}

/// Frame stream backing a client's SSE response body.
#[derive(Debug)]
pub struct SessionStream {
    frames: ReceiverStream<String>,
    _guard: SessionGuard,
}

impl Stream for SessionStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.frames)
            .poll_next(cx)
            .map(|frame| frame.map(Ok))
    }
}
