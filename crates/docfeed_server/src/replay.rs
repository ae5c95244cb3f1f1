//! Replay of a client conversation without a live connection.
//!
//! The request/response transport cannot hold a socket open, so it posts
//! the client's frames in one go and gets back every frame a live session
//! would have sent for them.

use crate::session::SyncSession;
use crate::sink::CollectingSink;
use docfeed_core::DocumentStore;
use std::sync::Arc;

/// Runs `messages` through a fresh session and returns its output frames.
///
/// The session handles one `handle_text` per message and is then
/// disconnected, exactly as a live connection would be. It never joins the
/// store's listener registry, so commits made while the replay runs cannot
/// change its output.
pub fn replay(
    store: &Arc<DocumentStore>,
    messages: &[String],
    peer: &str,
    max_per_message: usize,
) -> Vec<String> {
    let sink = Arc::new(CollectingSink::new());
    let session = SyncSession::unattached(Arc::clone(store), sink.clone(), peer, max_per_message);

    for message in messages {
        tracing::debug!(peer, frame = %message, "replaying frame");
        session.handle_text(message);
    }
    session.disconnect();

    let frames = sink.take_frames();
    tracing::info!(peer, input = messages.len(), output = frames.len(), "replay finished");
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfeed_protocol::ServerMessage;
    use serde_json::json;

    fn store_with(count: usize) -> Arc<DocumentStore> {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        store
            .upsert_batch((0..count).map(|i| json!({"_id": format!("d{i}")})).collect())
            .unwrap();
        store
    }

    #[test]
    fn sync_then_documents() {
        let store = store_with(3);
        let frames = replay(
            &store,
            &[
                r#"{"event":"sync_request","known_rev":2}"#.to_string(),
                r#"{"event":"request_documents","ids":["d0"]}"#.to_string(),
            ],
            "proxy",
            1000,
        );

        assert_eq!(frames.len(), 2);
        let first = ServerMessage::decode(&frames[0]).unwrap();
        let update = first.as_header_update().unwrap();
        assert_eq!(update.rev, [2, 3]);
        assert_eq!(ServerMessage::decode(&frames[1]).unwrap().event(), "update_documents");
    }

    #[test]
    fn replay_is_deterministic() {
        let store = store_with(2500);
        let input = vec![r#"{"event":"sync_request"}"#.to_string()];
        let a = replay(&store, &input, "p", 1000);
        let b = replay(&store, &input, "p", 1000);
        assert_eq!(a.len(), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn replay_leaves_no_listener_behind() {
        let store = store_with(1);
        replay(&store, &[r#"{"event":"sync_request"}"#.to_string()], "p", 1000);
        assert!(store.listeners().is_empty());
    }

    #[test]
    fn empty_and_junk_input() {
        let store = store_with(1);
        assert!(replay(&store, &[], "p", 1000).is_empty());
        assert!(replay(&store, &["junk".to_string()], "p", 1000).is_empty());
    }
}
