//! # DocFeed Sync Protocol
//!
//! Wire messages exchanged between sync clients and the server.
//!
//! This crate provides:
//! - [`ClientMessage`]: `sync_request` and `request_documents`
//! - [`ServerMessage`]: `update_headers` and `update_documents`
//! - [`chunk_headers`]: splitting one header delivery into bounded messages
//!
//! Every frame is a JSON object discriminated by its `event` field. This is
//! a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod chunk;
mod error;
mod messages;

pub use chunk::{chunk_headers, MAX_HEADERS_PER_MESSAGE};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{ClientMessage, HeaderUpdate, ServerMessage};
