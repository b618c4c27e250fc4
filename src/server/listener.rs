//! Ingest listener
//!
//! Handles the TCP accept loop and spawns one decode task per producer.

use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::error::Result;
use crate::protocol::FrameCodec;

use super::connection::IngestConnection;
use super::relay::EventSender;

/// Producer-facing listener
pub struct IngestListener {
    listener: TcpListener,
    events: EventSender,
    max_payload_len: usize,
    tcp_nodelay: bool,
    next_connection_id: u64,
}

impl IngestListener {
    /// Bind the listener
    pub async fn bind(
        addr: &str,
        events: EventSender,
        max_payload_len: usize,
        tcp_nodelay: bool,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Ingest listening");

        Ok(Self {
            listener,
            events,
            max_payload_len,
            tcp_nodelay,
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept producers until the listener fails
    ///
    /// Errors tied to a single pending connection are logged and skipped.
    /// Anything else ends the loop so the link can be rebuilt.
    pub async fn run(mut self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                Err(e) if is_transient(&e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Ingest listener failed");
                    return Err(e.into());
                }
            }
        }
    }

    fn handle_connection(&mut self, socket: TcpStream, peer_addr: SocketAddr) {
        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        if self.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::warn!(connection_id = connection_id, error = %e, "Failed to configure socket");
            }
        }

        let connection = IngestConnection::new(connection_id, peer_addr, self.events.clone());
        let codec = FrameCodec::with_max_payload_len(self.max_payload_len);

        tokio::spawn(async move {
            if let Err(e) = connection.run(socket, codec).await {
                tracing::debug!(connection_id = connection_id, error = %e, "Ingest connection error");
            }
        });
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
