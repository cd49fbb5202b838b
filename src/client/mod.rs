//! The `client` module is the outbound side of the protocol.
//!
//! It provides [`PubSubClient`], the session an application (or the
//! interactive console) uses to connect to a server, issue commands and
//! receive published messages through a callback.

pub mod pubsub_client;
pub use pubsub_client::{MessageHandler, PubSubClient};
