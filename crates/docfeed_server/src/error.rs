//! Error types for the sync server.

use docfeed_core::CoreError;
use docfeed_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Shared-secret check failed.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// An uploaded batch was rejected; nothing was written.
    #[error("ingestion failed: payload {index}: {reason}")]
    IngestionFailed {
        /// Position of the offending payload in the batch.
        index: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// Store error.
    #[error("store error: {0}")]
    Core(CoreError),

    /// Frame encoding or decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::IngestionFailed { index, reason } => {
                ServerError::IngestionFailed { index, reason }
            }
            other => ServerError::Core(other),
        }
    }
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::NotAuthorized(_)
                | ServerError::IngestionFailed { .. }
                | ServerError::Protocol(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::Core(_) | ServerError::WebSocket(_) | ServerError::Io(_)
        )
    }
}
