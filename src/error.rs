//! Error types
//!
//! Malformed ingest data never shows up here: the frame codec recovers from it
//! locally by resynchronising. What remains are the failures a caller can act on.

use thiserror::Error;

use crate::link::LinkKind;
use crate::registry::RegistryError;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ingest stream failure
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Subscriber registry failure
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// A link could not be established
    #[error("{kind} link unavailable: {message}")]
    Link { kind: LinkKind, message: String },

    /// MQTT client failure on the heartbeat link
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The relay event loop is gone
    #[error("relay is shut down")]
    RelayClosed,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn link(kind: LinkKind, message: impl Into<String>) -> Self {
        Self::Link {
            kind,
            message: message.into(),
        }
    }
}

/// Ingest frame errors
///
/// Only conditions that force the ingest connection closed. Bad magic and
/// truncated frames are not errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Declared payload length exceeds the configured ceiling
    #[error("declared payload of {declared} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { declared: usize, limit: usize },

    /// Underlying transport failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
