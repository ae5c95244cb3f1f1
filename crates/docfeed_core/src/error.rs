//! Error types for DocFeed core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the document store.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] docfeed_storage::StorageError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A payload in an ingestion batch was rejected; nothing was written.
    #[error("ingestion failed: payload {index}: {reason}")]
    IngestionFailed {
        /// Position of the offending payload in the batch.
        index: usize,
        /// Why the payload was rejected.
        reason: String,
    },

    /// A journal record passed its checksum but could not be decoded.
    #[error("journal corruption at offset {offset}: {message}")]
    JournalCorruption {
        /// Byte offset of the record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A stored body could not be decompressed.
    #[error("compression error: {0}")]
    Compression(String),
}

impl CoreError {
    /// Creates an ingestion failure for the payload at `index`.
    pub fn ingestion_failed(index: usize, reason: impl Into<String>) -> Self {
        Self::IngestionFailed {
            index,
            reason: reason.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Returns true if the error was caused by caller input rather than the
    /// store itself.
    pub fn is_rejected_input(&self) -> bool {
        matches!(self, CoreError::IngestionFailed { .. })
    }
}
