//! # DocFeed Storage
//!
//! Append-only byte backends underneath the DocFeed journal.
//!
//! A backend knows nothing about documents, headers or revisions. It stores
//! the framed journal records that `docfeed_core` writes and hands the raw
//! bytes back on recovery.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - a single journal file on disk
//!
//! ## Example
//!
//! ```rust
//! use docfeed_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
