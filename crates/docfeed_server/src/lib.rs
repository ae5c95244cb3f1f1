//! # DocFeed Sync Server
//!
//! Change-feed server for DocFeed.
//!
//! This crate provides:
//! - [`SyncSession`]: the per-connection sync state machine
//! - Outbound sinks: [`ChannelSink`] for live sockets, [`CollectingSink`]
//!   for replay
//! - [`replay`]: running a whole client conversation in one call
//! - [`SyncServer`]: upload, replay, drop and info handlers plus the
//!   WebSocket listener
//! - A shared-secret cookie check on the WebSocket handshake
//!
//! # Protocol
//!
//! 1. Client connects and sends `sync_request` with the lowest revision it
//!    still needs (or null for everything)
//! 2. Server streams the matching headers in `update_headers` messages of at
//!    most 1000 headers each
//! 3. Client is then live and receives every later commit as it happens
//! 4. At any point the client may fetch bodies with `request_documents`

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod replay;
mod server;
mod session;
mod sink;

pub use auth::{find_cookie, SharedSecretValidator};
pub use config::{ServerConfig, DEFAULT_SECRET_NAME};
pub use error::{ServerError, ServerResult};
pub use replay::replay;
pub use server::{ServerInfo, SyncServer, UploadReceipt};
pub use session::{SessionState, SyncSession};
pub use sink::{ChannelSink, CollectingSink, OutboundSink, SinkError};
