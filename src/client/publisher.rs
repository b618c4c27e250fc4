//! Ingest publisher
//!
//! Producer-side helper that stamps routing keys and writes frames to the
//! relay's ingest link.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio_util::codec::FramedWrite;

use crate::error::Result;
use crate::protocol::{FrameCodec, RoutingKey, StreamFrame};

/// Frame producer
///
/// # Example
/// ```no_run
/// use nyx_stream::client::IngestPublisher;
///
/// # async fn example() -> nyx_stream::error::Result<()> {
/// let mut publisher = IngestPublisher::connect("127.0.0.1:8888").await?;
/// publisher.send("device/temperature", b"21.5").await?;
/// # Ok(())
/// # }
/// ```
pub struct IngestPublisher<W = TcpStream> {
    frames: FramedWrite<W, FrameCodec>,
    sent: u64,
}

impl IngestPublisher<TcpStream> {
    /// Connect to an ingest address (`tcp://` prefix accepted)
    pub async fn connect(addr: &str) -> Result<Self> {
        let addr = crate::server::config::strip_scheme(addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(addr = %addr, "Publisher connected");
        Ok(Self::new(stream))
    }
}

impl<W: AsyncWrite + Unpin> IngestPublisher<W> {
    /// Wrap an existing writer
    pub fn new(writer: W) -> Self {
        Self {
            frames: FramedWrite::new(writer, FrameCodec::new()),
            sent: 0,
        }
    }

    /// Send a payload under the key derived from `name`
    pub async fn send(&mut self, name: &str, payload: impl AsRef<[u8]>) -> Result<()> {
        self.send_keyed(RoutingKey::from_name(name), payload).await
    }

    /// Send a payload under a precomputed key
    pub async fn send_keyed(&mut self, key: RoutingKey, payload: impl AsRef<[u8]>) -> Result<()> {
        self.frames.send(StreamFrame::new(key, payload)?).await?;
        self.sent += 1;
        Ok(())
    }

    /// Frames written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.frames.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio_util::codec::Decoder;

    use super::*;

    #[tokio::test]
    async fn test_send_writes_wire_frames() {
        let mut publisher = IngestPublisher::new(Vec::new());
        publisher.send("device/metric", b"hello").await.unwrap();
        publisher.send_keyed(RoutingKey(7), b"").await.unwrap();
        assert_eq!(publisher.sent(), 2);

        let mut buf = BytesMut::from(&publisher.into_inner()[..]);
        let mut codec = FrameCodec::new();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.routing_key(), RoutingKey::from_name("device/metric"));
        assert_eq!(&first.payload()[..], b"hello");

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.routing_key(), RoutingKey(7));
        assert_eq!(second.payload_len(), 0);
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let mut publisher = IngestPublisher::new(Vec::new());
        let payload = vec![0u8; crate::protocol::constants::DEFAULT_MAX_PAYLOAD_LEN + 1];

        assert!(publisher.send("a/b", &payload).await.is_err());
        assert_eq!(publisher.sent(), 0);
    }
}
