//! Ingest wire protocol
//!
//! - [`routing`]: stream name to routing key
//! - [`codec`]: incremental frame decoder / encoder
//! - [`constants`]: magic, header size and timing defaults

pub mod codec;
pub mod constants;
pub mod routing;

pub use codec::{put_frame, FrameCodec, StreamFrame};
pub use routing::RoutingKey;
