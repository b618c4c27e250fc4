//! Subscriber records
//!
//! A subscriber is one upgraded downstream connection bound to a single
//! routing key. The registry owns it; the connection itself only holds the
//! receiving half of its outbound queue.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::protocol::RoutingKey;

/// Identity of a subscriber's transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message queued for a subscriber's transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Complete wire frame, header included
    Frame(Bytes),
    /// Zero-payload liveness probe
    Ping,
}

/// Result of offering a message to a subscriber's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued for the transport
    Sent,
    /// Queue full; message dropped for this subscriber only
    Full,
    /// Transport gone; subscriber must be removed
    Closed,
}

/// One registered downstream
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    routing_key: RoutingKey,
    throttle: Duration,
    last_delivery: Option<Instant>,
    tx: mpsc::Sender<Outbound>,

    /// Stream name as requested (for logs)
    pub name: String,

    /// Remote address, when the transport exposes one
    pub peer_addr: Option<SocketAddr>,

    /// When the subscribe handshake completed
    pub opened_at: Instant,

    /// Frames delivered so far
    pub delivered: u64,
}

impl Subscriber {
    pub fn new(
        id: SubscriberId,
        routing_key: RoutingKey,
        throttle: Duration,
        tx: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id,
            routing_key,
            throttle,
            last_delivery: None,
            tx,
            name: String::new(),
            peer_addr: None,
            opened_at: Instant::now(),
            delivered: 0,
        }
    }

    /// Attach the stream name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach the remote address
    pub fn with_peer(mut self, peer_addr: Option<SocketAddr>) -> Self {
        self.peer_addr = peer_addr;
        self
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn routing_key(&self) -> RoutingKey {
        self.routing_key
    }

    /// Minimum spacing between deliveries (zero = unthrottled)
    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn last_delivery(&self) -> Option<Instant> {
        self.last_delivery
    }

    /// Whether a frame arriving at `now` may be delivered
    pub fn is_due(&self, now: Instant) -> bool {
        if self.throttle.is_zero() {
            return true;
        }
        match self.last_delivery {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.throttle,
        }
    }

    /// Record a successful delivery at `now`
    pub fn mark_delivered(&mut self, now: Instant) {
        self.last_delivery = Some(now);
        self.delivered += 1;
    }

    /// Offer a message without waiting
    pub fn offer(&self, message: Outbound) -> SendOutcome {
        match self.tx.try_send(message) {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(throttle_ms: u64) -> (Subscriber, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(2);
        let sub = Subscriber::new(
            SubscriberId(1),
            RoutingKey(0xAABBCCDD),
            Duration::from_millis(throttle_ms),
            tx,
        );
        (sub, rx)
    }

    #[test]
    fn test_unthrottled_always_due() {
        let (mut sub, _rx) = subscriber(0);
        let now = Instant::now();

        assert!(sub.is_due(now));
        sub.mark_delivered(now);
        assert!(sub.is_due(now));
    }

    #[test]
    fn test_throttle_window() {
        let (mut sub, _rx) = subscriber(100);
        let t0 = Instant::now();

        assert!(sub.is_due(t0));
        sub.mark_delivered(t0);

        assert!(!sub.is_due(t0 + Duration::from_millis(99)));
        assert!(sub.is_due(t0 + Duration::from_millis(100)));
        assert_eq!(sub.delivered, 1);
    }

    #[test]
    fn test_offer_outcomes() {
        let (sub, mut rx) = subscriber(0);

        assert_eq!(sub.offer(Outbound::Ping), SendOutcome::Sent);
        assert_eq!(sub.offer(Outbound::Ping), SendOutcome::Sent);
        assert_eq!(sub.offer(Outbound::Ping), SendOutcome::Full);

        assert_eq!(rx.try_recv().unwrap(), Outbound::Ping);
        drop(rx);
        assert_eq!(sub.offer(Outbound::Ping), SendOutcome::Closed);
    }
}
