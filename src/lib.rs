//! # linesub
//!
//! `linesub` is a small topic-based publish/subscribe broker speaking a
//! line-oriented text protocol over TCP. Clients connect, subscribe to topics
//! and publish data; the server fans each published line out to every
//! connection currently subscribed to its topic.
//!
//! ## Core Modules
//!
//! - `broker`: the wire message codec and the topic subscription registry.
//! - `transport`: connection handles, framing, server sessions and the listener.
//! - `client`: the outbound client session used by applications.
//! - `console`: parsing of interactive client commands.
//! - `config`: layered configuration loading.
//! - `utils`: error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod console;
pub mod transport;
pub mod utils;

pub use broker::{Broker, Message};
pub use client::PubSubClient;
pub use transport::{Server, start_server};
pub use utils::{Error, Result};
