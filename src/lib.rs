//! # nyx-stream
//!
//! Real-time relay for framed telemetry records. Producers write frames to a
//! TCP ingest link; each frame carries a 32-bit routing key. Subscribers open
//! a WebSocket on the control plane naming a stream, and receive every frame
//! whose key matches the hash of that name, optionally throttled.
//!
//! ```text
//! producer ──TCP──▶ ingest ──▶ relay loop ──▶ WebSocket subscribers
//!                                  ▲
//!          control plane (HTTP) ───┘        heartbeat ──▶ MQTT
//! ```
//!
//! The [`server::Relay`] loop owns all subscriber and link state; everything
//! else talks to it over a channel.

pub mod auth;
pub mod client;
pub mod error;
pub mod link;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use auth::AuthToken;
pub use client::IngestPublisher;
pub use error::{Error, Result};
pub use protocol::{FrameCodec, RoutingKey, StreamFrame};
pub use server::{Relay, RelayConfig, RuntimeConfig};
