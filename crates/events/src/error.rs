//! Error types for the events crate.

use thiserror::Error;

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Event error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The receiving side of a feed is gone.
    #[error("event channel closed")]
    ChannelClosed,

    /// The upstream event source reported an error for one item.
    #[error("event source '{source_name}' failed: {reason}")]
    Source { source_name: String, reason: String },

    /// An event could not be decoded into a namespace event.
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },
}

impl Error {
    /// Create a source error.
    pub fn source_failed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid event error.
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }
}
