//! # DocFeed Core
//!
//! Document store and change notification for DocFeed.
//!
//! This crate provides:
//! - [`DocumentStore`]: latest body per identity plus a header index ordered
//!   by revision, rebuilt from an append-only journal
//! - [`RevisionAllocator`]: contiguous revision blocks per ingestion batch
//! - [`ListenerRegistry`]: fan-out of committed headers to attached listeners
//!
//! ## Example
//!
//! ```rust
//! use docfeed_core::{DocumentStore, Revision};
//! use serde_json::json;
//!
//! let store = DocumentStore::open_in_memory().unwrap();
//! let headers = store
//!     .upsert_batch(vec![json!({"_id": "a", "type": "state"})])
//!     .unwrap();
//! assert_eq!(headers[0].rev, Revision::new(1));
//! assert!(store.get_headers(Some(Revision::new(1))).is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod codec;
mod config;
mod error;
mod header;
pub mod journal;
mod listener;
mod revision;
mod store;
mod types;

pub use codec::{decode_compressed, encode_compressed};
pub use config::{StoreConfig, DEFAULT_COMPACT_MIN_BYTES, DEFAULT_COMPACT_RATIO};
pub use error::{CoreError, CoreResult};
pub use header::{Draft, Header};
pub use listener::{HeaderListener, ListenerError, ListenerId, ListenerRegistry, NotifyReport};
pub use revision::{Revision, RevisionAllocator};
pub use store::{CompactReport, DocumentStore, StoreStats};
pub use types::DocumentId;

/// Crate version, reported by the server's info endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
