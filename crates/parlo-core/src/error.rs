//! Common error types for Parlo.

use thiserror::Error;

/// Result type alias using Parlo's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Parlo operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Signaling protocol error
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The signaling channel is gone
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

impl Error {
    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a channel-closed error from any displayable type.
    pub fn channel_closed(msg: impl std::fmt::Display) -> Self {
        Self::ChannelClosed(msg.to_string())
    }
}
