//! Subscriber registry and fan-out
//!
//! The registry tracks connected downstream subscribers, each bound to one
//! routing key. The relay loop owns it outright; ingest connections and
//! WebSocket pumps only reach it through relay events.
//!
//! # Architecture
//!
//! ```text
//!   [ingest conn] ──Frame──┐
//!   [ingest conn] ──Frame──┤        Relay::run (owner)
//!                          ├──► ┌────────────────────────────┐
//!   [ws pump] ─Opened/Closed┘    │ SubscriberRegistry         │
//!                               │   by_key: key -> [id, ..]  │
//!                               │   subscribers: id -> Sub   │
//!                               └─────────────┬──────────────┘
//!                                             │ fanout::dispatch
//!                       ┌─────────────────────┼─────────────────────┐
//!                       ▼                     ▼                     ▼
//!                 mpsc::Sender          mpsc::Sender          mpsc::Sender
//!                  └► ws pump            └► ws pump            └► ws pump
//! ```
//!
//! # Buffer Sharing
//!
//! Inside the relay every subscriber receives a clone of the frame's `Bytes`,
//! which only bumps a reference count on the buffer the decoder split off the
//! socket. The bytes are copied once per subscriber at the WebSocket boundary,
//! where the pump hands them to `Message::Binary` as an owned `Vec<u8>`.

pub mod error;
pub mod fanout;
pub mod store;
pub mod subscriber;

pub use error::RegistryError;
pub use fanout::{dispatch, probe_all, DispatchReport};
pub use store::SubscriberRegistry;
pub use subscriber::{Outbound, SendOutcome, Subscriber, SubscriberId};
