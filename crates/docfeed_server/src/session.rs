//! Per-connection sync state machine.
//!
//! ```text
//! New ──sync_request──▶ Syncing ──backlog drained──▶ Live
//!  │                       │                          │
//!  └───────────────────────┴────── disconnect ───────▶ Closed
//! ```
//!
//! While Syncing, notifications from the store are queued behind the
//! snapshot instead of being sent, so the client sees one ordered stream:
//! the backfill followed by everything committed after it.

use crate::sink::{OutboundSink, SinkError};
use docfeed_core::{
    DocumentId, DocumentStore, Header, HeaderListener, ListenerError, ListenerId, Revision,
};
use docfeed_protocol::{chunk_headers, ClientMessage, ServerMessage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no sync requested yet. Notifications are dropped.
    New,
    /// Sending the backfill. Notifications are queued.
    Syncing,
    /// Backfill done. Notifications are sent as they arrive.
    Live,
    /// Disconnected. Everything is ignored.
    Closed,
}

struct Inner {
    state: SessionState,
    backlog: VecDeque<Vec<Header>>,
    /// Highest revision sent during the current sync.
    last_sent: Option<Revision>,
    listener: Option<ListenerId>,
}

/// One client's view of the change feed.
pub struct SyncSession {
    store: Arc<DocumentStore>,
    sink: Arc<dyn OutboundSink>,
    peer: String,
    max_per_message: usize,
    inner: Mutex<Inner>,
}

impl SyncSession {
    /// Creates a session and attaches it to the store's listener registry.
    pub fn connect(
        store: Arc<DocumentStore>,
        sink: Arc<dyn OutboundSink>,
        peer: impl Into<String>,
        max_per_message: usize,
    ) -> Arc<Self> {
        let session = Self::unattached(store, sink, peer, max_per_message);
        let listener: Arc<dyn HeaderListener> = session.clone();
        let id = session.store.listeners().register(&listener);
        session.inner.lock().listener = Some(id);
        tracing::info!(peer = %session.peer, listener = id.as_u64(), "client connected");
        session
    }

    /// Creates a session that never receives store notifications.
    ///
    /// Used for replay, where the whole exchange happens in one call and
    /// nothing can be committed in between.
    pub fn unattached(
        store: Arc<DocumentStore>,
        sink: Arc<dyn OutboundSink>,
        peer: impl Into<String>,
        max_per_message: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            sink,
            peer: peer.into(),
            max_per_message: max_per_message.max(1),
            inner: Mutex::new(Inner {
                state: SessionState::New,
                backlog: VecDeque::new(),
                last_sent: None,
                listener: None,
            }),
        })
    }

    /// Peer label given at connect time.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Header batches waiting behind an in-progress sync.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock().backlog.len()
    }

    /// Handles one text frame from the client.
    ///
    /// Frames that do not decode, and events this server does not know,
    /// are logged and dropped.
    pub fn handle_text(&self, text: &str) {
        match ClientMessage::decode(text) {
            Ok(Some(message)) => self.handle_message(message),
            Ok(None) => {
                tracing::debug!(peer = %self.peer, "ignoring unknown event");
            }
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "ignoring undecodable frame");
            }
        }
    }

    /// Dispatches a decoded client message.
    pub fn handle_message(&self, message: ClientMessage) {
        if self.state() == SessionState::Closed {
            return;
        }
        match message {
            ClientMessage::SyncRequest { known_rev } => self.sync_request(known_rev),
            ClientMessage::RequestDocuments { ids } => self.request_documents(&ids),
        }
    }

    /// Sends every header at or above `known_rev`, then goes Live.
    ///
    /// `None`, zero or a negative value sends the full set. The store is
    /// read outside the session lock; commits that land meanwhile are
    /// queued and sent after the snapshot, each header exactly once.
    pub fn sync_request(&self, known_rev: Option<i64>) {
        {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Syncing;
            inner.last_sent = None;
        }

        // At least one header must come back for a client that is already
        // up to date, so the bound is one below what it knows.
        let from = known_rev
            .and_then(|rev| u64::try_from(rev).ok())
            .and_then(|rev| Revision::new(rev).prev());
        tracing::info!(peer = %self.peer, known_rev = ?known_rev, "sync requested");
        let snapshot = self.store.get_headers(from);

        let mut inner = self.inner.lock();
        if inner.state != SessionState::Syncing {
            return;
        }
        inner.backlog.push_front(snapshot);

        while let Some(batch) = inner.backlog.pop_front() {
            let fresh = unsent(&inner, batch);
            if let Err(e) = self.deliver(&mut inner, &fresh) {
                tracing::warn!(peer = %self.peer, error = %e, "sync aborted");
                self.close_locked(&mut inner);
                return;
            }
        }

        inner.state = SessionState::Live;
        tracing::info!(
            peer = %self.peer,
            sync_to_rev = ?inner.last_sent.map(Revision::as_u64),
            "client is live"
        );
    }

    /// Sends the bodies of the requested documents. Answered in any state
    /// except Closed.
    pub fn request_documents(&self, ids: &[DocumentId]) {
        let documents = match self.store.get_documents(ids) {
            Ok(documents) => documents,
            Err(e) => {
                tracing::error!(peer = %self.peer, error = %e, "failed to load documents");
                return;
            }
        };

        let found = documents.len();
        let message = ServerMessage::UpdateDocuments { documents };
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Closed {
            return;
        }
        match self.sink.send(&message) {
            Ok(()) => tracing::info!(
                peer = %self.peer,
                requested = ids.len(),
                found,
                "documents sent"
            ),
            Err(e) => {
                tracing::warn!(peer = %self.peer, error = %e, "document reply failed");
                self.close_locked(&mut inner);
            }
        }
    }

    /// Detaches from the store and drops any queued headers.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Closed {
            self.close_locked(&mut inner);
            tracing::info!(peer = %self.peer, "client disconnected");
        }
    }

    fn close_locked(&self, inner: &mut Inner) {
        inner.state = SessionState::Closed;
        inner.backlog.clear();
        if let Some(id) = inner.listener.take() {
            self.store.listeners().unregister(id);
        }
    }

    fn deliver(&self, inner: &mut Inner, headers: &[Header]) -> Result<(), SinkError> {
        for message in chunk_headers(headers, self.max_per_message) {
            self.sink.send(&message)?;
            if let Some(update) = message.as_header_update() {
                tracing::debug!(
                    peer = %self.peer,
                    first = update.rev[0],
                    last = update.rev[1],
                    sent = update.total_sent,
                    avail = update.total_avail,
                    "headers sent"
                );
            }
        }
        if let Some(last) = headers.last() {
            inner.last_sent = Some(last.rev);
        }
        Ok(())
    }
}

/// Drops headers already covered by the current sync.
///
/// A commit whose rows were visible to the snapshot can still reach the
/// session through the registry after it went Live.
fn unsent(inner: &Inner, batch: Vec<Header>) -> Vec<Header> {
    match inner.last_sent {
        Some(last) => batch.into_iter().filter(|h| h.rev > last).collect(),
        None => batch,
    }
}

impl HeaderListener for SyncSession {
    fn update_headers(&self, headers: &[Header]) -> Result<(), ListenerError> {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::New | SessionState::Closed => Ok(()),
            SessionState::Syncing => {
                inner.backlog.push_back(headers.to_vec());
                Ok(())
            }
            SessionState::Live => {
                let fresh = unsent(&inner, headers.to_vec());
                match self.deliver(&mut inner, &fresh) {
                    Ok(()) => Ok(()),
                    Err(SinkError::Closed) => {
                        self.close_locked(&mut inner);
                        Err(ListenerError::Closed)
                    }
                    Err(e) => {
                        self.close_locked(&mut inner);
                        Err(ListenerError::Delivery(e.to_string()))
                    }
                }
            }
        }
    }

    fn describe(&self) -> String {
        self.peer.clone()
    }
}
