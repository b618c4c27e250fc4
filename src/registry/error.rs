//! Registry error types

use thiserror::Error;

use super::subscriber::SubscriberId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The transport already has a subscriber bound to it
    #[error("subscriber {0} is already registered")]
    AlreadyRegistered(SubscriberId),
}
