//! End-to-end session behaviour against a real store.

use docfeed_core::DocumentId;
use docfeed_protocol::{HeaderUpdate, ServerMessage};
use docfeed_server::{replay, CollectingSink, ServerConfig, SessionState, SyncServer, SyncSession};
use docfeed_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn header_updates(sink: &CollectingSink) -> Vec<HeaderUpdate> {
    sink.messages()
        .into_iter()
        .filter_map(|m| m.as_header_update().cloned())
        .collect()
}

fn delivered_revisions(sink: &CollectingSink) -> Vec<u64> {
    header_updates(sink)
        .iter()
        .flat_map(|u| u.headers.iter().map(|h| h.rev.as_u64()))
        .collect()
}

#[test]
fn backfill_then_live_scenario() {
    let server = SyncServer::in_memory(ServerConfig::default()).unwrap();
    let receipt = server
        .handle_upload(r#"{"docs": [{"type": "a"}, {"type": "b"}]}"#, "producer")
        .unwrap();
    assert_eq!((receipt.first_rev, receipt.last_rev), (Some(1), Some(2)));

    let sink = Arc::new(CollectingSink::new());
    let session = server.connect(sink.clone(), "client");
    session.handle_text(r#"{"event": "sync_request", "known_rev": null}"#);
    assert_eq!(session.state(), SessionState::Live);

    let updates = header_updates(&sink);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].headers.len(), 2);
    assert_eq!(updates[0].sync_to_rev, 2);

    server
        .handle_upload(r#"{"docs": [{"type": "c"}]}"#, "producer")
        .unwrap();
    let updates = header_updates(&sink);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].rev, [3, 3]);
    assert_eq!(updates[1].sync_to_rev, 3);
    assert_eq!(updates[1].headers[0].kind.as_deref(), Some("c"));
}

#[test]
fn large_backfill_is_chunked() {
    let test_store = TestStore::memory();
    test_store.upsert_batch(docs(2500)).unwrap();

    let sink = Arc::new(CollectingSink::new());
    let session = SyncSession::connect(Arc::clone(&test_store.store), sink.clone(), "c", 1000);
    session.sync_request(None);

    let updates = header_updates(&sink);
    let sizes: Vec<usize> = updates.iter().map(|u| u.headers.len()).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);
    assert!(updates.iter().all(|u| u.sync_to_rev == 2500 && u.total_avail == 2500));
    assert_eq!(updates[2].total_sent, 2500);
}

#[test]
fn sync_from_known_revision() {
    let test_store = TestStore::memory();
    test_store.upsert_batch(docs(10)).unwrap();

    let sink = Arc::new(CollectingSink::new());
    let session = SyncSession::connect(Arc::clone(&test_store.store), sink.clone(), "c", 1000);
    session.sync_request(Some(8));

    assert_eq!(delivered_revisions(&sink), vec![8, 9, 10]);
    assert_eq!(header_updates(&sink)[0].sync_to_rev, 10);
}

#[test]
fn concurrent_ingestion_during_sync_is_delivered_exactly_once() {
    for round in 0..20 {
        let test_store = TestStore::memory();
        test_store.upsert_batch(docs(300)).unwrap();

        let sink = Arc::new(CollectingSink::new());
        let session =
            SyncSession::connect(Arc::clone(&test_store.store), sink.clone(), "racer", 64);

        let store = Arc::clone(&test_store.store);
        let writer = thread::spawn(move || {
            for batch in 0..40 {
                let payloads = (0..3)
                    .map(|i| json!({"_id": format!("late-{round}-{batch}-{i}")}))
                    .collect();
                store.upsert_batch(payloads).unwrap();
            }
        });

        session.sync_request(None);
        writer.join().unwrap();
        assert_eq!(session.state(), SessionState::Live);

        let max = test_store.max_revision().unwrap().as_u64();
        assert_eq!(max, 420);
        assert_eq!(delivered_revisions(&sink), (1..=max).collect::<Vec<_>>());
    }
}

#[test]
fn replay_matches_live_session() {
    let test_store = TestStore::memory();
    test_store.upsert_batch(docs(1500)).unwrap();
    let input = vec![
        r#"{"event":"request_documents","ids":["doc-3","nope"]}"#.to_string(),
        r#"{"event":"sync_request","known_rev":700}"#.to_string(),
        r#"{"event":"bogus"}"#.to_string(),
        r#"{"event":"request_documents","ids":[]}"#.to_string(),
    ];

    let sink = Arc::new(CollectingSink::new());
    let live = SyncSession::connect(Arc::clone(&test_store.store), sink.clone(), "live", 1000);
    for frame in &input {
        live.handle_text(frame);
    }
    live.disconnect();

    let replayed = replay(&test_store.store, &input, "proxy", 1000);
    assert_eq!(replayed, sink.frames());
    assert_eq!(replayed.len(), 4);
}

#[test]
fn request_documents_returns_only_known_ids() {
    let test_store = TestStore::memory();
    test_store
        .upsert_batch(vec![doc("a", "state"), doc("b", "log")])
        .unwrap();

    let sink = Arc::new(CollectingSink::new());
    let session = SyncSession::connect(Arc::clone(&test_store.store), sink.clone(), "c", 1000);
    session.request_documents(&[
        DocumentId::from("ghost"),
        DocumentId::from("b"),
        DocumentId::from("a"),
    ]);
    session.request_documents(&[]);

    let messages = sink.messages();
    match &messages[0] {
        ServerMessage::UpdateDocuments { documents } => {
            let ids: Vec<_> = documents.iter().map(|d| d["_id"].clone()).collect();
            assert_eq!(ids, vec![json!("b"), json!("a")]);
            assert_eq!(documents[0]["_rev"], json!(2));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        messages[1],
        ServerMessage::UpdateDocuments {
            documents: Vec::new()
        }
    );
}

#[test]
fn malformed_upload_notifies_nobody() {
    let server = SyncServer::in_memory(ServerConfig::default()).unwrap();
    server
        .handle_upload(r#"{"docs": [{"_id": "a"}]}"#, "p")
        .unwrap();

    let sink = Arc::new(CollectingSink::new());
    let session = server.connect(sink.clone(), "c");
    session.sync_request(None);
    let before = sink.frames().len();

    let result = server.handle_upload(r#"{"docs": [{"_id": "b"}, {"run": "x"}]}"#, "p");
    assert!(result.is_err());
    assert_eq!(sink.frames().len(), before);
    assert_eq!(server.store().len(), 1);
    assert_eq!(server.info().unwrap().max_rev, Some(1));
}

#[test]
fn file_backed_server_survives_restart() {
    let test_store = TestStore::file();
    test_store.upsert_batch(docs(5)).unwrap();
    let test_store = test_store.reopen();

    let server = SyncServer::new(ServerConfig::default(), Arc::clone(&test_store.store)).unwrap();
    let receipt = server
        .handle_upload(r#"{"docs": [{"_id": "new"}]}"#, "p")
        .unwrap();
    assert_eq!(receipt.first_rev, Some(6));
}
