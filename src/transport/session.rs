//! Server-side connection session
//!
//! One `Session` per accepted connection. It owns the read half of the
//! stream and the receive accumulator, and drives
//!
//! ```text
//! ACCEPTED -> READING <-> DISPATCHING -> CLOSING -> CLOSED
//! ```
//!
//! Each read is appended to the accumulator; every complete frame is decoded
//! and dispatched in order before the next read is issued. End of stream, a
//! read error, an oversized frame, a DISCONNECT command or the handle being
//! closed elsewhere all lead to `CLOSING`, which removes the connection from
//! the registry and closes the handle exactly once.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::broker::message::Message;
use crate::config::BrokerSettings;
use crate::transport::connection::Connection;
use crate::transport::framing::FrameBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Reading,
    Dispatching,
    Closing,
    Closed,
}

/// What the read loop should do after a batch of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Close,
}

#[derive(Debug)]
pub struct Session {
    connection: Arc<Connection>,
    broker: Arc<Broker>,
    frames: FrameBuffer,
    topics: HashSet<String>,
    client_name: Option<String>,
    state: SessionState,
    read_buffer_bytes: usize,
}

impl Session {
    pub fn new(connection: Arc<Connection>, broker: Arc<Broker>, settings: &BrokerSettings) -> Self {
        Self {
            connection,
            broker,
            frames: FrameBuffer::new(settings.max_frame_bytes),
            topics: HashSet::new(),
            client_name: None,
            state: SessionState::Accepted,
            read_buffer_bytes: settings.read_buffer_bytes.max(1),
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Name announced by the peer's CONNECT, if any.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Topics this connection is subscribed to.
    pub fn topics(&self) -> &HashSet<String> {
        &self.topics
    }

    /// Read from `reader` until the connection ends, then clean up.
    pub async fn run<R>(mut self, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut scratch = vec![0u8; self.read_buffer_bytes];
        let connection = self.connection.clone();

        loop {
            self.state = SessionState::Reading;
            let read = tokio::select! {
                read = reader.read(&mut scratch) => read,
                _ = connection.closed() => {
                    debug!(connection = %connection.id(), "read cancelled, connection closing");
                    break;
                }
            };

            match read {
                Ok(0) => {
                    info!(connection = %connection.id(), "peer closed the connection");
                    break;
                }
                Ok(n) => {
                    if self.feed(&scratch[..n]) == Control::Close {
                        break;
                    }
                }
                Err(e) => {
                    warn!(connection = %connection.id(), error = %e, "read failed");
                    break;
                }
            }
        }

        self.close();
    }

    /// Append one read's worth of bytes and dispatch every complete frame.
    pub fn feed(&mut self, data: &[u8]) -> Control {
        if self.state == SessionState::Closed {
            return Control::Close;
        }
        self.frames.extend(data);

        loop {
            let frame = match self.frames.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Control::Continue,
                Err(e) => {
                    warn!(connection = %self.connection.id(), error = %e, "dropping connection");
                    return Control::Close;
                }
            };

            self.state = SessionState::Dispatching;
            if self.dispatch_frame(frame) == Control::Close {
                return Control::Close;
            }
        }
    }

    fn dispatch_frame(&mut self, frame: Bytes) -> Control {
        debug!(connection = %self.connection.id(), frame = %String::from_utf8_lossy(&frame), "received frame");
        self.dispatch(Message::decode(&frame))
    }

    /// Apply one decoded message to the registry.
    pub fn dispatch(&mut self, message: Message) -> Control {
        let id = self.connection.id();

        match message {
            Message::Connect { client_name } => {
                info!(connection = %id, client = %client_name, "client connected");
                self.connection.set_label(client_name.clone());
                self.client_name = Some(client_name);
            }
            Message::Disconnect => {
                info!(connection = %id, client = ?self.client_name, "client disconnected");
                return Control::Close;
            }
            Message::Subscribe { topic } => {
                info!(connection = %id, topic = %topic, "subscribe");
                self.broker.subscribe(&topic, &self.connection);
                self.topics.insert(topic);
            }
            Message::Unsubscribe { topic } => {
                info!(connection = %id, topic = %topic, "unsubscribe");
                self.broker.unsubscribe(&topic, &id);
                self.topics.remove(&topic);
            }
            Message::Publish { topic, data } => {
                let delivered = self.broker.publish(&topic, &data);
                info!(connection = %id, topic = %topic, delivered, "publish");
            }
            Message::Unknown => {
                error!(connection = %id, "unknown message type received");
            }
        }
        Control::Continue
    }

    /// Remove every subscription and close the handle. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;

        self.broker.unsubscribe_all(&self.connection.id());
        self.topics.clear();
        if self.connection.close() {
            info!(connection = %self.connection.id(), client = ?self.client_name, "session closed");
        }

        self.state = SessionState::Closed;
    }
}
