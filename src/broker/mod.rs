//! The broker: the wire message codec and the topic subscription registry.
//!
//! Transport sessions decode frames into [`message::Message`] and apply them
//! to a shared [`Broker`], which fans published data out to subscribers.

pub mod engine;
pub mod message;
pub mod topic;

pub use engine::Broker;
pub use message::Message;

#[cfg(test)]
mod tests;
