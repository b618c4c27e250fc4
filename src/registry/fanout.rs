//! Fan-out of decoded frames to matching subscribers
//!
//! Delivery is lossy. A throttled subscriber sees a decimated
//! stream: a frame that arrives inside its throttle window is dropped for
//! that subscriber, never queued for later. The same holds when its outbound
//! queue is full. A subscriber whose transport has gone away is removed once
//! the pass is over.

use std::time::Instant;

use crate::protocol::StreamFrame;

use super::store::SubscriberRegistry;
use super::subscriber::{Outbound, SendOutcome, SubscriberId};

/// What happened to one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers bound to the frame's key
    pub matched: usize,
    /// Frames queued for a transport
    pub delivered: usize,
    /// Dropped because the subscriber's throttle window was still open
    pub throttled: usize,
    /// Dropped because the subscriber's queue was full
    pub backpressured: usize,
    /// Subscribers removed because their transport was gone
    pub closed: usize,
}

/// Deliver one frame to every eligible subscriber of its routing key
///
/// Frames with an empty payload are consumed without delivery.
pub fn dispatch(registry: &mut SubscriberRegistry, frame: &StreamFrame, now: Instant) -> DispatchReport {
    let mut report = DispatchReport::default();
    if frame.payload_len() == 0 {
        return report;
    }

    let mut closed: Vec<SubscriberId> = Vec::new();

    registry.for_each_matching(frame.routing_key(), |subscriber| {
        report.matched += 1;

        if !subscriber.is_due(now) {
            report.throttled += 1;
            return;
        }

        match subscriber.offer(Outbound::Frame(frame.as_wire().clone())) {
            SendOutcome::Sent => {
                subscriber.mark_delivered(now);
                report.delivered += 1;
            }
            SendOutcome::Full => {
                tracing::trace!(subscriber = %subscriber.id(), "Subscriber queue full, frame dropped");
                report.backpressured += 1;
            }
            SendOutcome::Closed => closed.push(subscriber.id()),
        }
    });

    for id in closed {
        if registry.remove(id).is_some() {
            report.closed += 1;
        }
    }

    report
}

/// Send a liveness probe to every subscriber
///
/// Returns the number of probes queued.
pub fn probe_all(registry: &mut SubscriberRegistry) -> usize {
    let mut sent = 0;
    let mut closed: Vec<SubscriberId> = Vec::new();

    registry.for_each(|subscriber| match subscriber.offer(Outbound::Ping) {
        SendOutcome::Sent => sent += 1,
        SendOutcome::Full => {
            tracing::debug!(subscriber = %subscriber.id(), "Keepalive skipped, queue full");
        }
        SendOutcome::Closed => closed.push(subscriber.id()),
    });

    for id in closed {
        registry.remove(id);
    }

    sent
}
