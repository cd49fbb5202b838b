//! Broker engine
//!
//! The in-memory subscription registry: topic name to subscriber set, plus a
//! reverse index from connection to topics so a disconnecting connection is
//! removed in O(its topics).
//!
//! Concurrency and usage notes:
//! - One `Broker` is constructed by the server root and shared as
//!   `Arc<Broker>` with every session. All methods take `&self`; the registry
//!   sits behind a single mutex held only for the duration of one operation.
//! - `publish` queues frames on each subscriber's connection while holding
//!   the lock. Queueing never blocks; the socket write happens later in the
//!   subscriber's send loop. Publish is therefore linearizable with
//!   `unsubscribe`/`unsubscribe_all`: once `unsubscribe_all` returns, no
//!   publish can reach that connection.
//! - Topics are pruned as soon as their last subscriber leaves.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::broker::message::Message;
use crate::broker::topic::Topic;
use crate::transport::connection::{Connection, ConnectionId, lock};

#[derive(Debug, Default)]
struct Registry {
    topics: HashMap<String, Topic>,
    memberships: HashMap<ConnectionId, HashSet<String>>,
}

#[derive(Debug, Default)]
pub struct Broker {
    registry: Mutex<Registry>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a connection to a topic. Automatically creates the topic if it doesn't exist.
    pub fn subscribe(&self, topic: &str, connection: &Arc<Connection>) {
        let mut registry = lock(&self.registry);
        let added = registry
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(connection.clone());
        registry
            .memberships
            .entry(connection.id())
            .or_default()
            .insert(topic.to_string());

        if added {
            debug!(connection = %connection.id(), topic, "subscribed");
        }
    }

    /// Unsubscribes a connection from a topic.
    /// If the topic does not exist, it will not perform any action
    pub fn unsubscribe(&self, topic: &str, id: &ConnectionId) {
        let mut registry = lock(&self.registry);
        registry.remove(topic, id);

        if let Some(topics) = registry.memberships.get_mut(id) {
            topics.remove(topic);
            if topics.is_empty() {
                registry.memberships.remove(id);
            }
        }
    }

    /// Removes a connection from every topic it is subscribed to.
    ///
    /// Safe to call for a connection that never subscribed, and more than once.
    pub fn unsubscribe_all(&self, id: &ConnectionId) {
        let mut registry = lock(&self.registry);
        let Some(topics) = registry.memberships.remove(id) else {
            return;
        };

        for topic in &topics {
            registry.remove(topic, id);
        }
        info!(connection = %id, topics = topics.len(), "removed all subscriptions");
    }

    /// Queues one PUBLISH frame for every open subscriber of `topic` and
    /// returns how many subscribers it was queued for.
    ///
    /// Closed subscribers are skipped and a failure on one subscriber never
    /// affects the others. Publishing to an unknown topic is a no-op.
    pub fn publish(&self, topic: &str, data: &str) -> usize {
        let registry = lock(&self.registry);
        let Some(entry) = registry.topics.get(topic) else {
            debug!(topic, "publish to topic without subscribers");
            return 0;
        };

        let frame = Message::publish(topic, data).encode();
        let mut delivered = 0;
        for (id, connection) in &entry.subscribers {
            if !connection.is_open() {
                debug!(connection = %id, topic, "skipping closed subscriber");
                continue;
            }
            match connection.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(connection = %id, topic, error = %e, "failed to deliver"),
            }
        }
        delivered
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        lock(&self.registry).topics.len()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        lock(&self.registry)
            .topics
            .get(topic)
            .map_or(0, |t| t.subscribers.len())
    }

    pub fn is_subscribed(&self, topic: &str, id: &ConnectionId) -> bool {
        lock(&self.registry)
            .topics
            .get(topic)
            .is_some_and(|t| t.subscribers.contains_key(id))
    }

    /// Topics the connection is currently subscribed to, sorted.
    pub fn topics_of(&self, id: &ConnectionId) -> Vec<String> {
        let registry = lock(&self.registry);
        let mut topics: Vec<String> = registry
            .memberships
            .get(id)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    /// Whether any topic still references the connection.
    pub fn references(&self, id: &ConnectionId) -> bool {
        let registry = lock(&self.registry);
        registry.memberships.contains_key(id)
            || registry
                .topics
                .values()
                .any(|t| t.subscribers.contains_key(id))
    }
}

impl Registry {
    /// Remove one subscription, pruning the topic if it is left empty.
    fn remove(&mut self, topic: &str, id: &ConnectionId) {
        if let Some(entry) = self.topics.get_mut(topic) {
            if entry.unsubscribe(id) {
                debug!(connection = %id, topic, "unsubscribed");
            }
            if entry.is_empty() {
                self.topics.remove(topic);
            }
        }
    }
}
