//! The `error` module defines the error type shared across `linesub`.
//!
//! Only startup failures (bind, connect, configuration) are expected to reach
//! a caller. Failures local to one connection are logged and absorbed at the
//! session boundary.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("client is already connected")]
    AlreadyConnected,

    #[error("client is not connected")]
    NotConnected,

    #[error("invalid {command} message: {reason}")]
    InvalidMessage {
        command: &'static str,
        reason: String,
    },

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("frame exceeds {limit} bytes without a delimiter")]
    FrameTooLarge { limit: usize },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
