//! Transport error types

use thiserror::Error;

/// Errors surfaced to callers of the dispatcher
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Destination '{destination}' is not registered with the dispatcher")]
    UnregisteredDestination { destination: String },

    #[error("Dispatcher channel closed")]
    ChannelClosed,

    #[error("Payload encoding error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl DispatchError {
    /// Check if the send failed because the peer is unknown
    pub fn is_unregistered(&self) -> bool {
        matches!(self, DispatchError::UnregisteredDestination { .. })
    }
}
