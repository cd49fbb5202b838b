//! TCP listener
//!
//! Binds the configured address and accepts connections forever. Each
//! accepted socket is split: the write half goes to a [`Connection`] send
//! loop, the read half to a [`Session`] running on its own task, and the
//! listener immediately goes back to accepting.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use crate::broker::Broker;
use crate::config::BrokerSettings;
use crate::transport::connection::Connection;
use crate::transport::session::Session;
use crate::utils::{Error, Result};

/// Pause after a failed accept before trying again.
pub(crate) const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    broker: Arc<Broker>,
    settings: BrokerSettings,
}

impl Server {
    /// Bind `addr`. Failing to bind is fatal and reported to the caller.
    pub async fn bind(addr: &str, broker: Arc<Broker>, settings: BrokerSettings) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;
        info!("server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            broker,
            settings,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// Accept connections until the task is dropped. Accept errors are
    /// logged and do not stop the loop.
    pub async fn run(self) {
        loop {
            let (stream, peer) = accept_with_backoff(|| self.listener.accept()).await;
            self.start_session(stream, peer);
        }
    }

    fn start_session(&self, stream: TcpStream, peer: SocketAddr) {
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        let connection = Connection::spawn(writer, peer.to_string());
        info!(connection = %connection.id(), %peer, "new client connected");

        let session = Session::new(connection, self.broker.clone(), &self.settings);
        tokio::spawn(session.run(reader));
    }
}

/// Retry `accept` until it succeeds, pausing after each failure. Errors such
/// as EMFILE persist until some other socket closes.
pub(crate) async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                error!(error = %e, "error accepting connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Bind `addr` and serve until the task is dropped.
pub async fn start_server(addr: &str, broker: Arc<Broker>, settings: BrokerSettings) -> Result<()> {
    Server::bind(addr, broker, settings).await?.run().await;
    Ok(())
}
