//! Main sync server.

use crate::auth::SharedSecretValidator;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::replay::replay;
use crate::session::SyncSession;
use crate::sink::{ChannelSink, OutboundSink};
use docfeed_core::{DocumentId, DocumentStore};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header::COOKIE, StatusCode};
use tokio_tungstenite::tungstenite::Message;

/// Outcome of an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Documents written.
    pub accepted: usize,
    /// First revision assigned, if any document was written.
    pub first_rev: Option<u64>,
    /// Last revision assigned, if any document was written.
    pub last_rev: Option<u64>,
}

/// Host and store figures reported by [`SyncServer::info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Host the server runs on.
    pub hostname: String,
    /// Wall clock, float seconds since the Unix epoch.
    pub timestamp: f64,
    /// Server version.
    pub version: String,
    /// Live documents.
    pub documents: usize,
    /// Highest revision in the store.
    pub max_rev: Option<u64>,
    /// Journal size in bytes.
    pub journal_bytes: u64,
    /// Compressed body bytes.
    pub body_bytes: u64,
    /// Attached sessions.
    pub listeners: usize,
}

#[derive(Deserialize)]
struct UploadRequest {
    docs: Vec<Value>,
}

#[derive(Deserialize)]
struct ProxyRequest {
    messages: Vec<Value>,
}

#[derive(Serialize)]
struct ProxyResponse {
    messages: Vec<String>,
}

/// The sync server.
///
/// Owns the document store (and through it the listener registry) for the
/// lifetime of the process. Producers upload through
/// [`handle_upload`](Self::handle_upload); clients either hold a WebSocket
/// open via [`run`](Self::run) or post whole conversations to
/// [`handle_sync_proxy`](Self::handle_sync_proxy).
///
/// # Example
///
/// ```
/// use docfeed_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::in_memory(ServerConfig::default()).unwrap();
/// let receipt = server
///     .handle_upload(r#"{"docs": [{"type": "a"}, {"type": "b"}]}"#, "producer")
///     .unwrap();
/// assert_eq!(receipt.last_rev, Some(2));
/// ```
pub struct SyncServer {
    config: ServerConfig,
    store: Arc<DocumentStore>,
    secret: Option<SharedSecretValidator>,
    hostname: String,
}

impl SyncServer {
    /// Creates a sync server over an open store.
    pub fn new(config: ServerConfig, store: Arc<DocumentStore>) -> ServerResult<Self> {
        let secret = config
            .secret
            .as_deref()
            .map(|secret| SharedSecretValidator::new(config.secret_name.clone(), secret))
            .transpose()?;
        let hostname = hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .unwrap_or_else(|| String::from("localhost"));

        Ok(Self {
            config,
            store,
            secret,
            hostname,
        })
    }

    /// Creates a sync server over a fresh in-memory store.
    pub fn in_memory(config: ServerConfig) -> ServerResult<Self> {
        let store = DocumentStore::open_in_memory()?;
        Self::new(config, Arc::new(store))
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The document store.
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Opens a session for `peer` that writes into `sink`.
    pub fn connect(&self, sink: Arc<dyn OutboundSink>, peer: impl Into<String>) -> Arc<SyncSession> {
        SyncSession::connect(
            Arc::clone(&self.store),
            sink,
            peer,
            self.config.max_headers_per_message,
        )
    }

    /// Checks the `Cookie` header of a connection attempt.
    pub fn check_secret(&self, cookie_header: Option<&str>) -> ServerResult<()> {
        match &self.secret {
            Some(validator) => validator.validate_cookie_header(cookie_header),
            None => Ok(()),
        }
    }

    /// Ingests an upload body `{"docs": [...]}` as one batch.
    pub fn handle_upload(&self, body: &str, peer: &str) -> ServerResult<UploadReceipt> {
        let request: UploadRequest = serde_json::from_str(body)
            .map_err(|e| ServerError::InvalidRequest(format!("upload body: {e}")))?;
        let count = request.docs.len();

        let headers = self.store.upsert_batch(request.docs).map_err(|e| {
            tracing::warn!(peer, error = %e, "upload rejected");
            ServerError::from(e)
        })?;

        tracing::info!(peer, count, "accepted documents");
        Ok(UploadReceipt {
            accepted: headers.len(),
            first_rev: headers.first().map(|h| h.rev.as_u64()),
            last_rev: headers.last().map(|h| h.rev.as_u64()),
        })
    }

    /// Replays a posted conversation `{"messages": [...]}` and returns
    /// `{"messages": [...]}` with every frame the session produced.
    ///
    /// Input messages may be frame strings or JSON objects.
    pub fn handle_sync_proxy(&self, body: &str, peer: &str) -> ServerResult<String> {
        let request: ProxyRequest = serde_json::from_str(body)
            .map_err(|e| ServerError::InvalidRequest(format!("proxy body: {e}")))?;
        let input: Vec<String> = request
            .messages
            .into_iter()
            .map(|message| match message {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect();

        let messages = replay(
            &self.store,
            &input,
            peer,
            self.config.max_headers_per_message,
        );
        serde_json::to_string(&ProxyResponse { messages })
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))
    }

    /// Removes documents. Attached sessions are not told.
    pub fn handle_drop_ids(&self, ids: &[DocumentId]) -> ServerResult<usize> {
        Ok(self.store.delete(ids)?)
    }

    /// Host and store figures.
    pub fn info(&self) -> ServerResult<ServerInfo> {
        let stats = self.store.stats()?;
        Ok(ServerInfo {
            hostname: self.hostname.clone(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default(),
            version: docfeed_core::VERSION.to_string(),
            documents: stats.documents,
            max_rev: stats.max_revision.map(|r| r.as_u64()),
            journal_bytes: stats.journal_bytes,
            body_bytes: stats.body_bytes,
            listeners: self.store.listeners().len(),
        })
    }

    /// Binds the configured address and serves WebSocket clients until
    /// the listener fails.
    pub async fn run(self: Arc<Self>) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "sync server listening");
        self.serve(listener).await
    }

    /// Serves WebSocket clients on an already bound listener.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> ServerResult<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            tracing::debug!(%addr, "new tcp connection");

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, addr).await {
                    tracing::warn!(%addr, error = %e, "connection ended with error");
                }
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> ServerResult<()> {
        let gate = Arc::clone(&self);
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let cookie = request
                .headers()
                .get(COOKIE)
                .and_then(|value| value.to_str().ok());
            match gate.check_secret(cookie) {
                Ok(()) => Ok(response),
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "handshake refused");
                    let mut denied = ErrorResponse::new(Some(String::from("shared secret required")));
                    *denied.status_mut() = StatusCode::UNAUTHORIZED;
                    Err(denied)
                }
            }
        };

        let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (sink, mut outbound) = ChannelSink::new(self.config.outbound_queue_capacity);
        let session = self.connect(Arc::new(sink), addr.to_string());

        let result = loop {
            tokio::select! {
                incoming = ws_receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()),
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => session.handle_text(text),
                        Err(_) => tracing::warn!(%addr, "ignoring non-utf8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(ServerError::from(e)),
                },
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = ws_sender.send(Message::Text(frame.into())).await {
                            break Err(ServerError::from(e));
                        }
                    }
                    None => {
                        tracing::warn!(%addr, "outbound queue overflowed, dropping client");
                        break Ok(());
                    }
                },
            }
        };

        session.disconnect();
        if let Err(e) = ws_sender.close().await {
            tracing::debug!(%addr, error = %e, "close handshake failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use serde_json::json;

    fn server() -> SyncServer {
        SyncServer::in_memory(ServerConfig::default()).unwrap()
    }

    #[test]
    fn upload_assigns_revisions() {
        let server = server();
        let receipt = server
            .handle_upload(r#"{"docs": [{"type": "a"}, {"type": "b"}]}"#, "p")
            .unwrap();
        assert_eq!(
            receipt,
            UploadReceipt {
                accepted: 2,
                first_rev: Some(1),
                last_rev: Some(2)
            }
        );

        let empty = server.handle_upload(r#"{"docs": []}"#, "p").unwrap();
        assert_eq!(empty.accepted, 0);
        assert_eq!(empty.first_rev, None);
    }

    #[test]
    fn bad_upload_bodies() {
        let server = server();
        assert!(matches!(
            server.handle_upload("nope", "p"),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(matches!(
            server.handle_upload(r#"{"documents": []}"#, "p"),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(matches!(
            server.handle_upload(r#"{"docs": [{"type": "a"}, 5]}"#, "p"),
            Err(ServerError::IngestionFailed { index: 1, .. })
        ));
        assert!(server.store().is_empty());
    }

    #[test]
    fn sync_proxy_round_trip() {
        let server = server();
        server
            .handle_upload(r#"{"docs": [{"_id": "a"}]}"#, "p")
            .unwrap();

        let body = json!({
            "messages": [
                "{\"event\":\"sync_request\",\"known_rev\":null}",
                {"event": "request_documents", "ids": ["a"]},
            ]
        })
        .to_string();
        let reply: Value = serde_json::from_str(&server.handle_sync_proxy(&body, "p").unwrap()).unwrap();
        let messages = reply["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(Value::is_string));
    }

    #[test]
    fn drop_ids_is_silent() {
        let server = server();
        server
            .handle_upload(r#"{"docs": [{"_id": "a"}, {"_id": "b"}]}"#, "p")
            .unwrap();
        let sink = Arc::new(CollectingSink::new());
        let session = server.connect(sink.clone(), "watcher");
        session.sync_request(None);
        let before = sink.frames().len();

        let removed = server
            .handle_drop_ids(&[DocumentId::from("a"), DocumentId::from("x")])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(sink.frames().len(), before);
        assert_eq!(server.store().len(), 1);
    }

    #[test]
    fn info_reports_store() {
        let server = server();
        server
            .handle_upload(r#"{"docs": [{"_id": "a"}]}"#, "p")
            .unwrap();
        let info = server.info().unwrap();
        assert_eq!(info.documents, 1);
        assert_eq!(info.max_rev, Some(1));
        assert!(info.journal_bytes > 0);
        assert!(!info.hostname.is_empty());
    }

    #[test]
    fn secret_check() {
        let open = server();
        assert!(open.check_secret(None).is_ok());

        let guarded =
            SyncServer::in_memory(ServerConfig::default().with_secret("s3cret")).unwrap();
        assert!(guarded.check_secret(None).is_err());
        assert!(guarded
            .check_secret(Some("docfeed_secret=s3cret"))
            .is_ok());
        assert!(guarded.check_secret(Some("docfeed_secret=nope")).is_err());
    }
}
