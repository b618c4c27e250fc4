//! Relay server
//!
//! Wires the relay loop to its three links: the ingest listener, the control
//! plane and the heartbeat publisher.

pub mod config;
pub mod connection;
pub mod control;
pub mod heartbeat;
pub mod links;
pub mod listener;
pub mod relay;
pub mod runtime;

use std::sync::Arc;

pub use config::RelayConfig;
pub use control::{create_router, ControlState};
pub use links::NetworkLinkFactory;
pub use relay::{event_channel, EventReceiver, EventSender, Relay, RelayEvent};
pub use runtime::RuntimeConfig;

use crate::error::Result;

/// Build a relay backed by real sockets
///
/// The returned runtime handle is how callers request a stop.
pub fn build(config: RelayConfig) -> Result<(Relay<NetworkLinkFactory>, Arc<RuntimeConfig>)> {
    config.validate()?;

    let runtime = Arc::new(RuntimeConfig::new(config.poll_interval_ms, config.auth_token()));
    let (events_tx, events_rx) = event_channel();
    let factory = NetworkLinkFactory::new(config.clone(), runtime.clone(), events_tx);
    let relay = Relay::new(&config, runtime.clone(), factory, events_rx);

    Ok((relay, runtime))
}
