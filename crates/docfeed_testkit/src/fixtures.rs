//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use docfeed_core::{
    DocumentStore, Header, HeaderListener, ListenerError, ListenerId, ListenerRegistry,
    StoreConfig,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Arc<DocumentStore>,
    journal_path: Option<PathBuf>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(
                DocumentStore::open_in_memory().expect("Failed to open in-memory store"),
            ),
            journal_path: None,
            _temp_dir: None,
        }
    }

    /// Creates a new file-backed test store in a temp directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal_path = temp_dir.path().join("docs.journal");
        let store = open_file_store(&journal_path);

        Self {
            store: Arc::new(store),
            journal_path: Some(journal_path),
            _temp_dir: Some(temp_dir),
        }
    }

    /// Journal path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.journal_path.as_deref()
    }

    /// Closes and reopens a file-backed store, replaying its journal.
    ///
    /// Panics for in-memory stores and if another `Arc` to the store is
    /// still alive.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            journal_path,
            _temp_dir,
        } = self;
        let path = journal_path.expect("Only file-backed stores can be reopened");
        assert_eq!(
            Arc::strong_count(&store),
            1,
            "store still shared at reopen"
        );
        drop(store);

        Self {
            store: Arc::new(open_file_store(&path)),
            journal_path: Some(path),
            _temp_dir,
        }
    }
}

fn open_file_store(path: &Path) -> DocumentStore {
    DocumentStore::open_file(
        path,
        StoreConfig::default().sync_on_commit(false),
        Arc::new(ListenerRegistry::new()),
    )
    .expect("Failed to open file store")
}

impl std::ops::Deref for TestStore {
    type Target = DocumentStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Arc<DocumentStore>) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&Arc<DocumentStore>, &Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, path)
}

/// A listener that remembers every batch it was handed.
#[derive(Default)]
pub struct RecordingListener {
    batches: Mutex<Vec<Vec<Header>>>,
}

impl RecordingListener {
    /// Creates a listener and registers it with `store`.
    ///
    /// The returned `Arc` is the only strong reference; dropping it detaches
    /// the listener.
    pub fn attach(store: &DocumentStore) -> Arc<Self> {
        Self::attach_with_id(store).0
    }

    /// Like [`attach`](Self::attach) but also returns the registry handle.
    pub fn attach_with_id(store: &DocumentStore) -> (Arc<Self>, ListenerId) {
        let recorder = Arc::new(Self::default());
        let listener: Arc<dyn HeaderListener> = recorder.clone();
        let id = store.listeners().register(&listener);
        (recorder, id)
    }

    /// All batches received, in order.
    pub fn batches(&self) -> Vec<Vec<Header>> {
        self.batches.lock().clone()
    }

    /// Every revision received, flattened in arrival order.
    pub fn revisions(&self) -> Vec<u64> {
        self.batches
            .lock()
            .iter()
            .flatten()
            .map(|h| h.rev.as_u64())
            .collect()
    }
}

impl HeaderListener for RecordingListener {
    fn update_headers(&self, headers: &[Header]) -> Result<(), ListenerError> {
        self.batches.lock().push(headers.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        String::from("recorder")
    }
}

/// A minimal well-formed payload.
pub fn doc(id: &str, kind: &str) -> Value {
    json!({
        "_id": id,
        "type": kind,
        "hostname": "testhost",
        "timestamp": 1_700_000_000.0,
    })
}

/// `count` payloads with distinct identities `doc-0`, `doc-1`, ….
pub fn docs(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| doc(&format!("doc-{i}"), "state"))
        .collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a store holding `count` documents ingested one per batch.
    pub fn populated_store(count: usize) -> TestStore {
        let test_store = TestStore::memory();
        for payload in docs(count) {
            test_store
                .upsert_batch(vec![payload])
                .expect("Failed to ingest document");
        }
        test_store
    }
}
