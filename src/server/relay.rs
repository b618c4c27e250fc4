//! The relay event loop
//!
//! One task owns the subscriber registry and the link slots. Ingest
//! connections, WebSocket pumps and link tasks never touch them directly;
//! they post [`RelayEvent`]s and the loop applies them one at a time, so
//! registry mutation and fan-out never interleave.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::link::{LinkFactory, LinkKind, LinkManager};
use crate::protocol::{RoutingKey, StreamFrame};
use crate::registry::{self, Outbound, Subscriber, SubscriberId, SubscriberRegistry};
use crate::stats::RelayStats;

use super::config::RelayConfig;
use super::heartbeat;
use super::runtime::RuntimeConfig;

/// Depth of the shared event queue
pub const EVENT_QUEUE: usize = 1024;

/// Sending half of the relay event queue
pub type EventSender = mpsc::Sender<RelayEvent>;

/// Receiving half of the relay event queue
pub type EventReceiver = mpsc::Receiver<RelayEvent>;

/// Create the relay event queue
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_QUEUE)
}

/// Messages handled by the relay loop
#[derive(Debug)]
pub enum RelayEvent {
    /// A complete frame decoded from an ingest connection
    Frame(StreamFrame),

    /// A subscriber finished its upgrade handshake
    SubscriberOpened {
        id: SubscriberId,
        routing_key: RoutingKey,
        throttle: Duration,
        tx: mpsc::Sender<Outbound>,
        name: String,
        peer: Option<SocketAddr>,
    },

    /// A subscriber transport closed
    SubscriberClosed { id: SubscriberId },

    /// An established link ended
    LinkClosed { kind: LinkKind, generation: u64 },
}

/// The relay loop and the state it owns
pub struct Relay<F> {
    runtime: Arc<RuntimeConfig>,
    factory: F,
    events: EventReceiver,
    registry: SubscriberRegistry,
    links: LinkManager,
    stats: RelayStats,
    retry_interval: Duration,
    keepalive_interval: Duration,
    heartbeat_interval: Duration,
    heartbeat_topic: String,
    heartbeat_message: String,
}

impl<F: LinkFactory> Relay<F> {
    pub fn new(
        config: &RelayConfig,
        runtime: Arc<RuntimeConfig>,
        factory: F,
        events: EventReceiver,
    ) -> Self {
        Self {
            runtime,
            factory,
            events,
            registry: SubscriberRegistry::new(),
            links: LinkManager::new(),
            stats: RelayStats::new(),
            retry_interval: config.retry_interval,
            keepalive_interval: config.keepalive_interval,
            heartbeat_interval: config.heartbeat_interval,
            heartbeat_topic: config.heartbeat_topic.clone(),
            heartbeat_message: config.heartbeat_message.clone(),
        }
    }

    /// Run until a stop is requested
    ///
    /// The stop flag is checked at the top of every iteration, so the event
    /// being handled always completes first. Each wait is bounded by the
    /// current poll interval. Returns the final counters.
    pub async fn run(mut self) -> RelayStats {
        // Links come up on the first retry tick, which fires immediately
        let mut retry = time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let start = Instant::now();
        let mut keepalive = time::interval_at(start + self.keepalive_interval, self.keepalive_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = time::interval_at(start + self.heartbeat_interval, self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_ms = self.runtime.poll_interval_ms(),
            auth = self.runtime.auth_token().is_some(),
            "Relay started"
        );

        loop {
            if self.runtime.is_stopping() {
                break;
            }

            // Zero would spin without ever yielding to the timers
            let poll = self.runtime.poll_interval().max(Duration::from_millis(1));

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        tracing::warn!("Event queue closed");
                        break;
                    }
                },
                _ = retry.tick() => {
                    self.links.reconnect(&self.factory).await;
                }
                _ = keepalive.tick() => self.keepalive(),
                _ = heartbeat.tick() => self.announce(),
                _ = time::sleep(poll) => {}
            }
        }

        self.shutdown()
    }

    /// Apply one event to the owned state
    pub fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Frame(frame) => {
                let report = registry::dispatch(&mut self.registry, &frame, std::time::Instant::now());
                self.stats.record_dispatch(&report);
                tracing::trace!(
                    key = %frame.routing_key(),
                    len = frame.payload_len(),
                    matched = report.matched,
                    delivered = report.delivered,
                    "Frame dispatched"
                );
            }
            RelayEvent::SubscriberOpened {
                id,
                routing_key,
                throttle,
                tx,
                name,
                peer,
            } => {
                let subscriber = Subscriber::new(id, routing_key, throttle, tx)
                    .with_name(name)
                    .with_peer(peer);
                match self.registry.add(subscriber) {
                    Ok(()) => self.stats.subscribers_added += 1,
                    Err(e) => tracing::error!(error = %e, "Cannot register subscriber"),
                }
            }
            RelayEvent::SubscriberClosed { id } => {
                if self.registry.remove(id).is_some() {
                    self.stats.subscribers_removed += 1;
                }
            }
            RelayEvent::LinkClosed { kind, generation } => {
                self.links.on_closed(kind, generation);
            }
        }
    }

    fn keepalive(&mut self) {
        let probed = registry::probe_all(&mut self.registry);
        self.stats.probes_sent += probed as u64;
        tracing::trace!(subscribers = probed, "Keepalive probes queued");
    }

    fn announce(&mut self) {
        let Some(client) = self
            .links
            .handle(LinkKind::Heartbeat)
            .and_then(|handle| handle.announcer())
        else {
            return;
        };

        match heartbeat::announce(client, &self.heartbeat_topic, &self.heartbeat_message) {
            Ok(()) => self.stats.heartbeats_sent += 1,
            Err(e) => tracing::warn!(error = %e, "Heartbeat publish failed"),
        }
    }

    fn shutdown(mut self) -> RelayStats {
        self.links.close_all();

        tracing::info!(
            uptime_secs = self.stats.uptime().as_secs(),
            frames = self.stats.frames_received,
            deliveries = self.stats.deliveries,
            throttled = self.stats.throttled,
            backpressured = self.stats.backpressured,
            subscribers = self.registry.len(),
            link_attempts = self.links.attempts(),
            link_failures = self.links.failures(),
            "Relay stopped"
        );

        self.stats
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub fn links(&self) -> &LinkManager {
        &self.links
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }
}
