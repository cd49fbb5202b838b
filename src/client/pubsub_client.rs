//! Client-side connection session
//!
//! `PubSubClient` connects to a server, announces its name with CONNECT and
//! then sends SUBSCRIBE / UNSUBSCRIBE / PUBLISH frames on request. Inbound
//! PUBLISH frames are decoded by a background read task and handed to the
//! registered message handler as `(topic, data)`.
//!
//! Outbound commands are fire-and-forget: they are queued on the connection's
//! send loop (which keeps them in order) and failures are logged rather than
//! returned. A command whose topic or data would not survive as a single
//! frame is never sent.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::broker::message::Message;
use crate::config::BrokerSettings;
use crate::transport::connection::{Connection, lock};
use crate::transport::framing::FrameBuffer;
use crate::utils::{Error, Result};

/// Callback invoked with `(topic, data)` for every inbound PUBLISH.
pub type MessageHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

pub struct PubSubClient {
    name: String,
    settings: BrokerSettings,
    handler: Arc<Mutex<Option<MessageHandler>>>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl PubSubClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, BrokerSettings::default())
    }

    pub fn with_settings(name: impl Into<String>, settings: BrokerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            handler: Arc::new(Mutex::new(None)),
            connection: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register the callback for inbound messages, replacing any previous one.
    pub fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        *lock(&self.handler) = Some(Arc::new(handler));
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.connection)
            .as_ref()
            .is_some_and(|c| c.is_open())
    }

    /// Change the name announced on the next CONNECT. Refused while a
    /// connection is open.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }
        self.name = name.into();
        Ok(())
    }

    /// Connect to `host:port`, start the read loop and announce our name.
    pub async fn connect(&self, host: &str, port: u16) -> Result<()> {
        let hello = Message::connect(self.name.clone());
        hello.validate()?;
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = format!("{host}:{port}");
        debug!(client = %self.name, %addr, "attempting to connect");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| Error::Connect {
                addr: addr.clone(),
                source,
            })?;
        let _ = stream.set_nodelay(true);

        let (reader, writer) = stream.into_split();
        let connection = Connection::spawn(writer, self.name.clone());
        {
            let mut slot = lock(&self.connection);
            if slot.as_ref().is_some_and(|c| c.is_open()) {
                // another connect won the race while we were dialing
                connection.close();
                return Err(Error::AlreadyConnected);
            }
            if let Some(stale) = slot.replace(connection.clone()) {
                stale.close();
            }
        }
        tokio::spawn(read_loop(
            reader,
            connection.clone(),
            self.handler.clone(),
            self.settings.clone(),
        ));
        info!(client = %self.name, %addr, "connected to server");

        self.send(hello);
        Ok(())
    }

    /// Send DISCONNECT (best effort) and close the connection.
    pub fn disconnect(&self) {
        self.detach();
    }

    /// Like [`disconnect`](Self::disconnect), but waits until every queued
    /// frame, DISCONNECT included, has been written and the socket shut down.
    pub async fn shutdown(&self) {
        if let Some(connection) = self.detach() {
            connection.drained().await;
        }
    }

    fn detach(&self) -> Option<Arc<Connection>> {
        let Some(connection) = lock(&self.connection).take() else {
            debug!(client = %self.name, "disconnect while not connected");
            return None;
        };

        if let Err(e) = connection.send(Message::Disconnect.encode()) {
            debug!(client = %self.name, error = %e, "could not send DISCONNECT");
        }
        connection.close();
        info!(client = %self.name, "client disconnected");
        Some(connection)
    }

    pub fn publish(&self, topic: &str, data: &str) {
        debug!(client = %self.name, topic, "publishing");
        self.send(Message::publish(topic, data));
    }

    pub fn subscribe(&self, topic: &str) {
        debug!(client = %self.name, topic, "subscribing");
        self.send(Message::subscribe(topic));
    }

    pub fn unsubscribe(&self, topic: &str) {
        debug!(client = %self.name, topic, "unsubscribing");
        self.send(Message::unsubscribe(topic));
    }

    fn send(&self, message: Message) {
        let result = message.validate().and_then(|()| match lock(&self.connection).as_ref() {
            Some(connection) => connection.send(message.encode()),
            None => Err(Error::NotConnected),
        });

        if let Err(e) = result {
            warn!(client = %self.name, command = message.command(), error = %e, "send failed");
        }
    }
}

impl std::fmt::Debug for PubSubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubClient")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Drop for PubSubClient {
    fn drop(&mut self) {
        if let Some(connection) = lock(&self.connection).take() {
            connection.close();
        }
    }
}

/// Decode inbound frames until the server goes away or the connection is
/// closed locally.
async fn read_loop<R>(
    mut reader: R,
    connection: Arc<Connection>,
    handler: Arc<Mutex<Option<MessageHandler>>>,
    settings: BrokerSettings,
) where
    R: AsyncRead + Unpin,
{
    let name = connection.label();
    let mut frames = FrameBuffer::new(settings.max_frame_bytes);
    let mut scratch = vec![0u8; settings.read_buffer_bytes.max(1)];

    'read: loop {
        let read = tokio::select! {
            read = reader.read(&mut scratch) => read,
            _ = connection.closed() => break,
        };

        match read {
            Ok(0) => {
                info!(client = %name, "server disconnected");
                break;
            }
            Ok(n) => frames.extend(&scratch[..n]),
            Err(e) => {
                error!(client = %name, error = %e, "error reading from server");
                break;
            }
        }

        loop {
            match frames.next_frame() {
                Ok(Some(frame)) => deliver(&name, &handler, Message::decode(&frame)),
                Ok(None) => break,
                Err(e) => {
                    error!(client = %name, error = %e, "dropping connection");
                    break 'read;
                }
            }
        }
    }

    connection.close();
}

fn deliver(name: &str, handler: &Mutex<Option<MessageHandler>>, message: Message) {
    match message {
        Message::Publish { topic, data } => {
            // clone out so the handler runs without the lock held
            let handler = lock(handler).clone();
            match handler {
                Some(handler) => handler(&topic, &data),
                None => info!(client = %name, topic = %topic, data = %data, "message received"),
            }
        }
        other => debug!(client = %name, command = other.command(), "ignoring frame from server"),
    }
}
