//! # DocFeed Testkit
//!
//! Test utilities for DocFeed.
//!
//! This crate provides:
//! - Store fixtures (in-memory and temp-file) and a recording listener
//! - Property-based payload generators using proptest
//! - Concurrent ingestion stress helpers
//! - Journal damage helpers for crash recovery tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docfeed_testkit::prelude::*;
//!
//! #[test]
//! fn listener_sees_batch() {
//!     with_temp_store(|store| {
//!         let recorder = RecordingListener::attach(store);
//!         store.upsert_batch(vec![doc("a", "state")]).unwrap();
//!         assert_eq!(recorder.revisions(), vec![1]);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
