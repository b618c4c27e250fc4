//! Heartbeat link over MQTT
//!
//! The link counts as established once the client and its event-loop task
//! exist. The broker connection is driven by the task; when the event loop
//! fails the task reports the closure and the retry timer builds a new one.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};

use crate::error::Result;
use crate::link::{LinkHandle, LinkKind};

use super::config::RelayConfig;
use super::relay::{EventSender, RelayEvent};

/// Requests the client may queue before `try_publish` reports full
const CLIENT_CAPACITY: usize = 16;

/// Create the MQTT client and spawn its event loop
pub fn connect(config: &RelayConfig, generation: u64, events: EventSender) -> Result<LinkHandle> {
    let (host, port) = config.heartbeat_endpoint()?;

    let mut options = MqttOptions::new(config.client_id.clone(), host.clone(), port);
    options.set_keep_alive(Duration::from_secs(30));
    if !config.username.is_empty() || !config.password.is_empty() {
        options.set_credentials(config.username.clone(), config.password.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(options, CLIENT_CAPACITY);

    let task = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    tracing::info!(host = %host, port = port, code = ?ack.code, "Heartbeat broker connected");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(host = %host, port = port, error = %e, "Heartbeat link lost");
                    break;
                }
            }
        }

        let _ = events
            .send(RelayEvent::LinkClosed {
                kind: LinkKind::Heartbeat,
                generation,
            })
            .await;
    });

    Ok(LinkHandle::new(task).with_announcer(client))
}

/// Queue one liveness announcement without waiting
pub fn announce(client: &AsyncClient, topic: &str, message: &str) -> Result<()> {
    client.try_publish(topic, QoS::AtMostOnce, false, message.as_bytes())?;
    Ok(())
}
