//! Statistics for the relay and its ingest connections

use std::time::{Duration, Instant};

use crate::registry::DispatchReport;

/// Relay-wide counters, owned by the relay loop
#[derive(Debug, Clone)]
pub struct RelayStats {
    /// When the relay started
    pub started_at: Instant,
    /// Frames handed to fan-out
    pub frames_received: u64,
    /// Frames queued to subscribers (one per subscriber)
    pub deliveries: u64,
    /// Deliveries skipped by throttling
    pub throttled: u64,
    /// Deliveries skipped because a subscriber queue was full
    pub backpressured: u64,
    /// Subscribers registered
    pub subscribers_added: u64,
    /// Subscribers removed
    pub subscribers_removed: u64,
    /// Keepalive probes queued
    pub probes_sent: u64,
    /// Heartbeats published
    pub heartbeats_sent: u64,
}

impl Default for RelayStats {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            frames_received: 0,
            deliveries: 0,
            throttled: 0,
            backpressured: 0,
            subscribers_added: 0,
            subscribers_removed: 0,
            probes_sent: 0,
            heartbeats_sent: 0,
        }
    }
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in the outcome of one fan-out pass
    pub fn record_dispatch(&mut self, report: &DispatchReport) {
        self.frames_received += 1;
        self.deliveries += report.delivered as u64;
        self.throttled += report.throttled as u64;
        self.backpressured += report.backpressured as u64;
        self.subscribers_removed += report.closed as u64;
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Per-connection ingest counters
#[derive(Debug, Clone)]
pub struct IngestStats {
    /// Connection start
    pub connected_at: Instant,
    /// Frames decoded
    pub frames: u64,
    /// Payload bytes decoded
    pub payload_bytes: u64,
    /// Bytes dropped while resynchronising
    pub skipped_bytes: u64,
}

impl Default for IngestStats {
    fn default() -> Self {
        Self {
            connected_at: Instant::now(),
            frames: 0,
            payload_bytes: 0,
            skipped_bytes: 0,
        }
    }
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, payload_len: usize) {
        self.frames += 1;
        self.payload_bytes += payload_len as u64;
    }

    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Payload throughput in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.payload_bytes * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_stats_new() {
        let stats = RelayStats::new();
        assert_eq!(stats.frames_received, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.subscribers_added, 0);
    }

    #[test]
    fn test_record_dispatch() {
        let mut stats = RelayStats::new();
        stats.record_dispatch(&DispatchReport {
            matched: 4,
            delivered: 2,
            throttled: 1,
            backpressured: 0,
            closed: 1,
        });
        stats.record_dispatch(&DispatchReport::default());

        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.throttled, 1);
        assert_eq!(stats.subscribers_removed, 1);
    }

    #[test]
    fn test_ingest_stats() {
        let mut stats = IngestStats::new();
        stats.record_frame(100);
        stats.record_frame(0);

        assert_eq!(stats.frames, 2);
        assert_eq!(stats.payload_bytes, 100);
    }

    #[test]
    fn test_ingest_bitrate_zero_duration() {
        let mut stats = IngestStats::new();
        stats.payload_bytes = 1_000_000;

        // Less than a second has elapsed
        assert_eq!(stats.bitrate(), 0);
    }
}
