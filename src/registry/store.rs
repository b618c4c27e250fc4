//! Subscriber registry implementation
//!
//! Owned by the relay loop and never shared, so no locking is needed. Every
//! mutation happens between fan-out passes, never during one.

use std::collections::HashMap;

use crate::protocol::RoutingKey;

use super::error::RegistryError;
use super::subscriber::{Subscriber, SubscriberId};

/// Set of currently connected subscribers
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    /// Subscribers by transport identity
    subscribers: HashMap<SubscriberId, Subscriber>,

    /// Subscriber ids per routing key, in registration order
    by_key: HashMap<RoutingKey, Vec<SubscriberId>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber
    ///
    /// A transport maps to at most one subscriber for its lifetime.
    pub fn add(&mut self, subscriber: Subscriber) -> Result<(), RegistryError> {
        let id = subscriber.id();
        if self.subscribers.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }

        tracing::info!(
            stream = %subscriber.routing_key(),
            name = %subscriber.name,
            period_ms = subscriber.throttle().as_millis() as u64,
            peer = ?subscriber.peer_addr,
            subscriber = %id,
            "Opening stream"
        );

        self.by_key
            .entry(subscriber.routing_key())
            .or_default()
            .push(id);
        self.subscribers.insert(id, subscriber);

        Ok(())
    }

    /// Remove the subscriber bound to a closed transport
    ///
    /// Idempotent: closure notifications may arrive more than once.
    pub fn remove(&mut self, id: SubscriberId) -> Option<Subscriber> {
        let subscriber = self.subscribers.remove(&id)?;
        let key = subscriber.routing_key();

        if let Some(ids) = self.by_key.get_mut(&key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_key.remove(&key);
            }
        }

        tracing::info!(
            stream = %key,
            peer = ?subscriber.peer_addr,
            subscriber = %id,
            delivered = subscriber.delivered,
            "Closing stream"
        );

        Some(subscriber)
    }

    /// Visit every subscriber bound to `key`, in registration order
    pub fn for_each_matching<F>(&mut self, key: RoutingKey, mut f: F)
    where
        F: FnMut(&mut Subscriber),
    {
        let Some(ids) = self.by_key.get(&key) else {
            return;
        };

        for id in ids {
            if let Some(subscriber) = self.subscribers.get_mut(id) {
                f(subscriber);
            }
        }
    }

    /// Visit every subscriber regardless of key
    pub fn for_each<F>(&self, f: F)
    where
        F: FnMut(&Subscriber),
    {
        self.subscribers.values().for_each(f);
    }

    pub fn get(&self, id: SubscriberId) -> Option<&Subscriber> {
        self.subscribers.get(&id)
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Number of subscribers bound to `key`
    pub fn count_for(&self, key: RoutingKey) -> usize {
        self.by_key.get(&key).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
