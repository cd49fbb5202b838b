//! The `transport` module is responsible for the network side of the broker.
//!
//! It provides the shared connection handle and its send loop, the receive
//! accumulator that splits a byte stream into frames, the per-connection
//! server session that dispatches decoded frames to the broker, and the TCP
//! listener that creates one session per accepted connection.

pub mod connection;
pub mod framing;
pub mod server;
pub mod session;

pub use connection::{Connection, ConnectionId};
pub use framing::FrameBuffer;
pub use server::{Server, start_server};
pub use session::{Control, Session, SessionState};
