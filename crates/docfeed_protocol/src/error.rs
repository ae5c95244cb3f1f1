//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding or encoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or encoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame has no string `event` field.
    #[error("frame has no event field")]
    MissingEvent,

    /// The event is known but its fields are wrong.
    #[error("invalid {event} message: {reason}")]
    InvalidMessage {
        /// Event name from the frame.
        event: String,
        /// What was wrong with it.
        reason: String,
    },
}
