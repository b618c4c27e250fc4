//! Wire constants shared by producers and the relay

/// Frame magic, little-endian on the wire (`"NYXS"` read as a u32)
pub const STREAM_MAGIC: u32 = 0x5358_594E;

/// Magic + routing key + payload length
pub const HEADER_SIZE: usize = 4 + 4 + 4;

/// Seed for routing-key hashing. Part of the producer contract.
pub const ROUTING_SEED: u32 = STREAM_MAGIC;

/// Default ceiling on a declared payload length (16 MiB)
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Default per-subscriber outbound queue depth
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 64;

/// Default event-loop poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10;

/// Reconnect cadence for absent links (ms)
pub const RETRY_INTERVAL_MS: u64 = 1_000;

/// Heartbeat announcement cadence (ms)
pub const HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// Subscriber liveness probe cadence (ms)
pub const KEEPALIVE_INTERVAL_MS: u64 = 10_000;

/// Well-known heartbeat channel
pub const HEARTBEAT_TOPIC: &str = "nyx/ping/special";

/// Fixed liveness announcement
pub const HEARTBEAT_MESSAGE: &str = "$$nyx-stream-server$$";

/// MQTT client identifier used on the heartbeat link
pub const DEFAULT_CLIENT_ID: &str = "nyx-stream";
