//! Link lifecycle
//!
//! The relay keeps three external links alive: the ingest listener, the
//! control-plane listener and the heartbeat publisher. Each lives in a slot
//! that is either absent or established. One shared timer walks the slots
//! and retries the absent ones at a constant interval, forever, without
//! backoff.

pub mod manager;
pub mod state;

pub use manager::{LinkFactory, LinkManager};
pub use state::{LinkHandle, LinkKind, LinkState};
