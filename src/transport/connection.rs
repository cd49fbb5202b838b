//! Shared connection handle
//!
//! A `Connection` is the write side of one live byte stream. It is shared as
//! `Arc<Connection>` between the session that reads the stream and every
//! registry entry that fans published frames out to it.
//!
//! Frames are never written to the socket by the caller. `send` pushes them
//! onto a per-connection queue that a dedicated send loop drains in order, so
//! writes from the owning session and from concurrent publishers can never
//! interleave inside a frame, and a slow peer never blocks a publisher.
//!
//! `close` drops the queue's sender under the same lock `send` and `is_open`
//! take, so a frame is either queued before the close or rejected after it.
//! Frames already queued are still flushed, then the write half is shut down.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::utils::{Error, Result};

/// Unique identity of a connection, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

pub struct Connection {
    id: ConnectionId,
    label: Mutex<String>,
    sender: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    closed: watch::Sender<bool>,
    send_task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Create a handle whose frames are delivered to the returned receiver.
    ///
    /// The caller is responsible for draining the receiver; tests use this
    /// directly to observe what a connection would have written.
    pub fn channel(label: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            label: Mutex::new(label.into()),
            sender: Mutex::new(Some(tx)),
            closed,
            send_task: Mutex::new(None),
        });
        (connection, rx)
    }

    /// Create a handle backed by `writer`, spawning its send loop.
    pub fn spawn<W>(writer: W, label: impl Into<String>) -> Arc<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (connection, rx) = Self::channel(label);
        let task = tokio::spawn(send_loop(writer, rx, Arc::downgrade(&connection)));
        *lock(&connection.send_task) = Some(task);
        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn label(&self) -> String {
        lock(&self.label).clone()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *lock(&self.label) = label.into();
    }

    /// Whether frames can still be queued on this connection.
    pub fn is_open(&self) -> bool {
        lock(&self.sender).is_some()
    }

    /// Queue one encoded frame for writing.
    pub fn send(&self, frame: Bytes) -> Result<()> {
        let sender = lock(&self.sender);
        match sender.as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| Error::ConnectionClosed),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Close the handle. Returns `true` only for the call that performed the
    /// close; later calls are no-ops.
    pub fn close(&self) -> bool {
        let was_open = lock(&self.sender).take().is_some();
        if was_open {
            self.closed.send_replace(true);
            debug!(connection = %self.id, "connection closed");
        }
        was_open
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Resolves once the send loop has written every queued frame and shut
    /// the writer down. Only meaningful after `close`; handles made with
    /// [`Connection::channel`] have no send loop and resolve immediately.
    pub async fn drained(&self) {
        let task = lock(&self.send_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(connection = %self.id, error = %e, "send loop failed");
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("label", &self.label())
            .field("open", &self.is_open())
            .finish()
    }
}

/// Write queued frames in order until the queue is closed and drained, then
/// shut the write half down. A write error closes the connection.
async fn send_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Bytes>, owner: Weak<Connection>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            if let Some(connection) = owner.upgrade() {
                warn!(connection = %connection.id(), error = %e, "write failed");
                connection.close();
            }
            break;
        }
    }

    let _ = writer.shutdown().await;
    debug!("send loop closed");
}

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
