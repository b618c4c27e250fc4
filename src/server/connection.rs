//! Per-producer ingest connection
//!
//! Owns the receive buffer for one producer and forwards decoded frames to the
//! relay loop in decode order.

use std::net::SocketAddr;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::error::{Error, Result};
use crate::protocol::FrameCodec;
use crate::stats::IngestStats;

use super::relay::{EventSender, RelayEvent};

/// One producer connection
pub struct IngestConnection {
    id: u64,
    peer_addr: SocketAddr,
    events: EventSender,
    stats: IngestStats,
}

impl IngestConnection {
    pub fn new(id: u64, peer_addr: SocketAddr, events: EventSender) -> Self {
        Self {
            id,
            peer_addr,
            events,
            stats: IngestStats::new(),
        }
    }

    /// Decode frames until the producer goes away
    ///
    /// An oversized frame or a closed relay ends the connection with an error.
    pub async fn run<S>(mut self, stream: S, codec: FrameCodec) -> Result<IngestStats>
    where
        S: AsyncRead + Unpin,
    {
        tracing::info!(connection_id = self.id, peer = %self.peer_addr, "Producer connected");

        let mut frames = FramedRead::new(stream, codec);
        let mut reported_skip = 0;

        let result = loop {
            let Some(item) = frames.next().await else {
                break Ok(());
            };

            let skipped = frames.decoder().skipped_bytes();
            if skipped > reported_skip {
                tracing::debug!(
                    connection_id = self.id,
                    skipped = skipped - reported_skip,
                    "Resynchronised ingest stream"
                );
                reported_skip = skipped;
            }

            match item {
                Ok(frame) => {
                    self.stats.record_frame(frame.payload_len());
                    if self.events.send(RelayEvent::Frame(frame)).await.is_err() {
                        break Err(Error::RelayClosed);
                    }
                }
                Err(e) => {
                    tracing::warn!(connection_id = self.id, peer = %self.peer_addr, error = %e, "Dropping producer");
                    break Err(e.into());
                }
            }
        };

        self.stats.skipped_bytes = frames.decoder().skipped_bytes();
        tracing::info!(
            connection_id = self.id,
            peer = %self.peer_addr,
            frames = self.stats.frames,
            payload_bytes = self.stats.payload_bytes,
            skipped_bytes = self.stats.skipped_bytes,
            bitrate = self.stats.bitrate(),
            duration_secs = self.stats.duration().as_secs(),
            "Producer disconnected"
        );

        result.map(|()| self.stats)
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio::sync::mpsc;

    use super::*;
    use crate::protocol::{put_frame, RoutingKey};
    use crate::server::relay::event_channel;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn wire(key: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_frame(RoutingKey(key), payload, &mut buf).unwrap();
        buf.to_vec()
    }

    fn collect(rx: &mut mpsc::Receiver<RelayEvent>) -> Vec<(u32, Vec<u8>)> {
        let mut out = Vec::new();
        while let Ok(RelayEvent::Frame(frame)) = rx.try_recv() {
            out.push((frame.routing_key().value(), frame.payload().to_vec()));
        }
        out
    }

    #[tokio::test]
    async fn test_chunk_split_reads() {
        let mut stream = wire(1, b"first");
        stream.extend(wire(2, b"second"));
        stream.extend(wire(1, b""));

        // Split mid-header and mid-payload
        let mock = tokio_test::io::Builder::new()
            .read(&stream[..5])
            .read(&stream[5..20])
            .read(&stream[20..])
            .build();

        let (tx, mut rx) = event_channel();
        let stats = IngestConnection::new(1, peer(), tx)
            .run(mock, FrameCodec::new())
            .await
            .unwrap();

        assert_eq!(
            collect(&mut rx),
            vec![(1, b"first".to_vec()), (2, b"second".to_vec()), (1, Vec::new())]
        );
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.payload_bytes, 11);
        assert_eq!(stats.skipped_bytes, 0);
    }

    #[tokio::test]
    async fn test_garbage_prefix_skipped() {
        let mut stream = vec![0xDE, 0xAD, 0xBE];
        stream.extend(wire(9, b"ok"));

        let mock = tokio_test::io::Builder::new().read(&stream).build();
        let (tx, mut rx) = event_channel();
        let stats = IngestConnection::new(2, peer(), tx)
            .run(mock, FrameCodec::new())
            .await
            .unwrap();

        assert_eq!(collect(&mut rx), vec![(9, b"ok".to_vec())]);
        assert_eq!(stats.skipped_bytes, 3);
    }

    #[tokio::test]
    async fn test_oversized_frame_disconnects() {
        let mut stream = wire(1, b"fine");
        stream.extend(wire(1, &[0u8; 64]));

        let mock = tokio_test::io::Builder::new().read(&stream).build();
        let (tx, mut rx) = event_channel();
        let result = IngestConnection::new(3, peer(), tx)
            .run(mock, FrameCodec::with_max_payload_len(16))
            .await;

        assert!(matches!(result, Err(Error::Frame(_))));
        assert_eq!(collect(&mut rx), vec![(1, b"fine".to_vec())]);
    }

    #[tokio::test]
    async fn test_relay_gone() {
        let mock = tokio_test::io::Builder::new().read(&wire(1, b"x")).build();
        let (tx, rx) = event_channel();
        drop(rx);

        let result = IngestConnection::new(4, peer(), tx)
            .run(mock, FrameCodec::new())
            .await;
        assert!(matches!(result, Err(Error::RelayClosed)));
    }
}
