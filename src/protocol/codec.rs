//! Ingest frame codec
//!
//! Frame layout (all fields little-endian):
//!
//! ```text
//! +-----------+-----------------+-----------------+-------------+
//! | Magic (4) | Routing key (4) | Payload len (4) | Payload (N) |
//! +-----------+-----------------+-----------------+-------------+
//! ```
//!
//! The transport gives no message boundaries, so the decoder works on a
//! growing buffer. A frame is never interpreted before header and declared
//! payload are both buffered. When the magic does not match at the current
//! position the decoder drops exactly one byte and tries again, which lets
//! it recover alignment after corruption or a torn write.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FrameError;

use super::constants::{DEFAULT_MAX_PAYLOAD_LEN, HEADER_SIZE, STREAM_MAGIC};
use super::routing::RoutingKey;

/// One decoded ingest record
///
/// Cheap to clone: the wire bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    routing_key: RoutingKey,
    raw: Bytes,
}

impl StreamFrame {
    /// Build a frame from a key and payload, encoding the wire form
    ///
    /// Fails when the payload does not fit the 32-bit length field.
    pub fn new(routing_key: RoutingKey, payload: impl AsRef<[u8]>) -> Result<Self, FrameError> {
        let payload = payload.as_ref();
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        put_frame(routing_key, payload, &mut buf)?;
        Ok(Self {
            routing_key,
            raw: buf.freeze(),
        })
    }

    pub fn routing_key(&self) -> RoutingKey {
        self.routing_key
    }

    /// Payload bytes (length from the wire)
    pub fn payload(&self) -> Bytes {
        self.raw.slice(HEADER_SIZE..)
    }

    pub fn payload_len(&self) -> usize {
        self.raw.len() - HEADER_SIZE
    }

    /// Complete wire representation, header included
    pub fn as_wire(&self) -> &Bytes {
        &self.raw
    }

    pub fn into_wire(self) -> Bytes {
        self.raw
    }
}

/// Write one frame into `dst`
///
/// Nothing is written when the payload is too long for the length field.
pub fn put_frame(routing_key: RoutingKey, payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    let len = length_field(payload.len())?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(STREAM_MAGIC);
    dst.put_u32_le(routing_key.value());
    dst.put_u32_le(len);
    dst.put_slice(payload);
    Ok(())
}

fn length_field(len: usize) -> Result<u32, FrameError> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        declared: len,
        limit: u32::MAX as usize,
    })
}

/// Incremental decoder / encoder for the ingest stream
#[derive(Debug)]
pub struct FrameCodec {
    max_payload_len: usize,
    skipped_bytes: u64,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_payload_len(DEFAULT_MAX_PAYLOAD_LEN)
    }

    pub fn with_max_payload_len(max_payload_len: usize) -> Self {
        Self {
            max_payload_len,
            skipped_bytes: 0,
        }
    }

    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    /// Bytes discarded while hunting for the magic
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped_bytes
    }
}

impl Decoder for FrameCodec {
    type Item = StreamFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamFrame>, FrameError> {
        loop {
            if src.len() < HEADER_SIZE {
                return Ok(None);
            }

            let mut header = &src[..HEADER_SIZE];
            let magic = header.get_u32_le();
            if magic != STREAM_MAGIC {
                src.advance(1);
                self.skipped_bytes += 1;
                continue;
            }

            let routing_key = RoutingKey(header.get_u32_le());
            let payload_len = header.get_u32_le() as usize;

            if payload_len > self.max_payload_len {
                return Err(FrameError::PayloadTooLarge {
                    declared: payload_len,
                    limit: self.max_payload_len,
                });
            }

            let frame_len = HEADER_SIZE + payload_len;
            if src.len() < frame_len {
                // Incomplete, keep everything for the next read
                src.reserve(frame_len - src.len());
                return Ok(None);
            }

            let raw = src.split_to(frame_len).freeze();
            return Ok(Some(StreamFrame { routing_key, raw }));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<StreamFrame>, FrameError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !src.is_empty() {
                    tracing::debug!(bytes = src.len(), "Discarding incomplete tail at end of stream");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<StreamFrame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: StreamFrame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.payload_len() > self.max_payload_len {
            return Err(FrameError::PayloadTooLarge {
                declared: item.payload_len(),
                limit: self.max_payload_len,
            });
        }

        dst.extend_from_slice(item.as_wire());
        Ok(())
    }
}
