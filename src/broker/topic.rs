//! Topic management
//!
//! A `Topic` holds the connections subscribed to one topic name, keyed by
//! connection id so duplicate subscriptions are a no-op.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the broker
//! keeps every topic behind its registry lock).

use std::collections::HashMap;
use std::sync::Arc;

use crate::transport::connection::{Connection, ConnectionId};

#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub subscribers: HashMap<ConnectionId, Arc<Connection>>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: HashMap::new(),
        }
    }

    /// Add a subscriber to the topic. Returns `false` if it was already there.
    pub fn subscribe(&mut self, connection: Arc<Connection>) -> bool {
        self.subscribers
            .insert(connection.id(), connection)
            .is_none()
    }

    /// Remove a subscriber from the topic. Returns `false` if it was not there.
    pub fn unsubscribe(&mut self, id: &ConnectionId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
