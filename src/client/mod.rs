//! Producer-side client
//!
//! Writes frames to a relay's ingest link.

pub mod publisher;

pub use publisher::IngestPublisher;
