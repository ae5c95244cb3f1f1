//! Protocol messages for sync.

use crate::error::{ProtocolError, ProtocolResult};
use docfeed_core::{DocumentId, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message sent by a sync client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start (or restart) a sync from `known_rev`.
    ///
    /// `None`, zero or a negative value asks for the full header set.
    SyncRequest {
        /// Lowest revision the client still needs.
        #[serde(default)]
        known_rev: Option<i64>,
    },
    /// Fetch bodies for the given identities.
    RequestDocuments {
        /// Requested identities.
        #[serde(default)]
        ids: Vec<DocumentId>,
    },
}

impl ClientMessage {
    const EVENTS: [&'static str; 2] = ["sync_request", "request_documents"];

    /// Decodes one client frame.
    ///
    /// Returns `Ok(None)` for a well-formed frame whose event this server
    /// does not handle, so callers can ignore it.
    pub fn decode(text: &str) -> ProtocolResult<Option<Self>> {
        let value: Value = serde_json::from_str(text)?;
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingEvent)?
            .to_owned();

        if !Self::EVENTS.iter().any(|known| *known == event) {
            return Ok(None);
        }

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ProtocolError::InvalidMessage {
                event,
                reason: e.to_string(),
            })
    }

    /// Encodes to a JSON frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Event name of this message.
    #[must_use]
    pub fn event(&self) -> &'static str {
        match self {
            Self::SyncRequest { .. } => "sync_request",
            Self::RequestDocuments { .. } => "request_documents",
        }
    }
}

/// One bounded slice of a header delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderUpdate {
    /// Revisions of the first and last header in this message.
    pub rev: [u64; 2],
    /// Last revision of the whole delivery this message belongs to.
    pub sync_to_rev: u64,
    /// The headers, ascending by revision.
    pub headers: Vec<Header>,
    /// Headers sent so far in this delivery, this message included.
    pub total_sent: usize,
    /// Headers in the whole delivery.
    pub total_avail: usize,
}

/// A message sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    /// New or changed headers.
    UpdateHeaders(HeaderUpdate),
    /// Bodies answering a `request_documents`.
    UpdateDocuments {
        /// Document bodies, in request order.
        documents: Vec<Value>,
    },
}

impl ServerMessage {
    /// Encodes to a JSON frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a server frame.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Event name of this message.
    #[must_use]
    pub fn event(&self) -> &'static str {
        match self {
            Self::UpdateHeaders(_) => "update_headers",
            Self::UpdateDocuments { .. } => "update_documents",
        }
    }

    /// The header update, if this is one.
    #[must_use]
    pub fn as_header_update(&self) -> Option<&HeaderUpdate> {
        match self {
            Self::UpdateHeaders(update) => Some(update),
            Self::UpdateDocuments { .. } => None,
        }
    }
}
