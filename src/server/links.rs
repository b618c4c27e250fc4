//! Production link factory
//!
//! Binds the ingest and control listeners and creates the heartbeat client.
//! Each link runs in its own task and reports its generation back to the relay
//! loop when it ends.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::link::{LinkFactory, LinkHandle, LinkKind};

use super::config::RelayConfig;
use super::control::{self, ControlState};
use super::heartbeat;
use super::listener::IngestListener;
use super::relay::{EventSender, RelayEvent};
use super::runtime::RuntimeConfig;

/// Establishes links on real sockets
pub struct NetworkLinkFactory {
    config: RelayConfig,
    runtime: Arc<RuntimeConfig>,
    events: EventSender,
}

impl NetworkLinkFactory {
    pub fn new(config: RelayConfig, runtime: Arc<RuntimeConfig>, events: EventSender) -> Self {
        Self {
            config,
            runtime,
            events,
        }
    }

    async fn ingest(&self, generation: u64) -> Result<LinkHandle> {
        let listener = IngestListener::bind(
            self.config.ingest_bind(),
            self.events.clone(),
            self.config.max_payload_len,
            self.config.tcp_nodelay,
        )
        .await
        .map_err(|e| Error::link(LinkKind::Ingest, e.to_string()))?;
        let addr = listener.local_addr()?;

        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let _ = listener.run().await;
            report_closed(&events, LinkKind::Ingest, generation).await;
        });

        Ok(LinkHandle::new(task).with_local_addr(addr))
    }

    async fn control(&self, generation: u64) -> Result<LinkHandle> {
        let listener = TcpListener::bind(self.config.control_bind())
            .await
            .map_err(|e| Error::link(LinkKind::Control, e.to_string()))?;
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Control plane listening");

        let state = ControlState::new(
            self.runtime.clone(),
            self.events.clone(),
            self.config.subscriber_queue,
        );
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = control::serve(listener, state).await {
                tracing::error!(error = %e, "Control plane failed");
            }
            report_closed(&events, LinkKind::Control, generation).await;
        });

        Ok(LinkHandle::new(task).with_local_addr(addr))
    }
}

impl LinkFactory for NetworkLinkFactory {
    async fn establish(&self, kind: LinkKind, generation: u64) -> Result<LinkHandle> {
        match kind {
            LinkKind::Ingest => self.ingest(generation).await,
            LinkKind::Control => self.control(generation).await,
            LinkKind::Heartbeat => heartbeat::connect(&self.config, generation, self.events.clone()),
        }
    }
}

async fn report_closed(events: &EventSender, kind: LinkKind, generation: u64) {
    let _ = events.send(RelayEvent::LinkClosed { kind, generation }).await;
}
