//! The document store.
//!
//! Two tables keyed by identity: a header projection indexed by revision and
//! a body table of compressed JSON. Both are rebuilt from the journal on
//! open and mutated only through committed journal entries.
//!
//! Overwritten bodies stay in the journal until it is compacted into a
//! single snapshot of the live rows. Compaction runs on demand and after
//! any commit that leaves the journal `compact_ratio` times larger than the
//! live bodies.

use crate::codec::{decode_compressed, encode_compressed};
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::header::{Draft, Header};
use crate::journal::{Journal, JournalEntry, JournalRow};
use crate::listener::ListenerRegistry;
use crate::revision::{Revision, RevisionAllocator};
use crate::types::{unix_now, DocumentId};
use docfeed_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// A row of the body table.
#[derive(Debug, Clone)]
struct BodyRow {
    rev: Revision,
    compressed: Vec<u8>,
}

#[derive(Debug, Default)]
struct Tables {
    headers: BTreeMap<Revision, Header>,
    bodies: HashMap<DocumentId, BodyRow>,
    /// Sum of compressed body sizes.
    body_bytes: u64,
}

impl Tables {
    fn max_revision(&self) -> Option<Revision> {
        self.headers.keys().next_back().copied()
    }

    fn put(&mut self, header: Header, compressed: Vec<u8>) {
        self.body_bytes += compressed.len() as u64;
        let row = BodyRow {
            rev: header.rev,
            compressed,
        };
        if let Some(old) = self.bodies.insert(header.id.clone(), row) {
            self.body_bytes -= old.compressed.len() as u64;
            self.headers.remove(&old.rev);
        }
        self.headers.insert(header.rev, header);
    }

    fn remove(&mut self, id: &DocumentId) -> bool {
        match self.bodies.remove(id) {
            Some(old) => {
                self.body_bytes -= old.compressed.len() as u64;
                self.headers.remove(&old.rev);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, entry: JournalEntry) -> CoreResult<()> {
        match entry {
            JournalEntry::Upsert { rows } => {
                for row in rows {
                    let compressed = encode_compressed(&row.body)?;
                    self.put(row.header, compressed);
                }
            }
            JournalEntry::Delete { ids } => {
                for id in &ids {
                    self.remove(id);
                }
            }
            JournalEntry::Snapshot { rows } => {
                *self = Self::default();
                for row in rows {
                    let compressed = encode_compressed(&row.body)?;
                    self.put(row.header, compressed);
                }
            }
        }
        Ok(())
    }

    /// Live rows in revision order, bodies decoded.
    fn snapshot_rows(&self) -> CoreResult<Vec<JournalRow>> {
        let mut rows = Vec::with_capacity(self.bodies.len());
        for header in self.headers.values() {
            if let Some(row) = self.bodies.get(&header.id) {
                rows.push(JournalRow {
                    header: header.clone(),
                    body: decode_compressed(&row.compressed)?,
                });
            }
        }
        Ok(rows)
    }
}

/// Point-in-time store figures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Live documents.
    pub documents: usize,
    /// Highest revision present.
    pub max_revision: Option<Revision>,
    /// Journal size on the backend.
    pub journal_bytes: u64,
    /// Sum of compressed body sizes.
    pub body_bytes: u64,
}

/// Outcome of a journal compaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactReport {
    /// Journal size before.
    pub before_bytes: u64,
    /// Journal size after.
    pub after_bytes: u64,
    /// Rows written to the snapshot.
    pub documents: usize,
}

/// Durable table of identity to latest body, plus the header index.
///
/// Ingestion is single-writer: revision allocation, the journal append and
/// the table swap all happen under one lock. Readers see either the whole
/// batch or none of it.
pub struct DocumentStore {
    config: StoreConfig,
    journal: Mutex<Journal>,
    tables: RwLock<Tables>,
    listeners: Arc<ListenerRegistry>,
}

impl DocumentStore {
    /// Opens a store over `backend`, replaying its journal.
    pub fn open(
        config: StoreConfig,
        backend: Box<dyn StorageBackend>,
        listeners: Arc<ListenerRegistry>,
    ) -> CoreResult<Self> {
        let (journal, entries) =
            Journal::open(backend, config.sync_on_commit, config.truncate_torn_tail)?;

        let mut tables = Tables::default();
        let replayed = entries.len();
        for entry in entries {
            tables.apply(entry)?;
        }
        tracing::info!(
            entries = replayed,
            documents = tables.bodies.len(),
            max_rev = ?tables.max_revision().map(Revision::as_u64),
            "document store opened"
        );

        Ok(Self {
            config,
            journal: Mutex::new(journal),
            tables: RwLock::new(tables),
            listeners,
        })
    }

    /// Opens an ephemeral store with its own registry.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(
            StoreConfig::default(),
            Box::new(InMemoryBackend::new()),
            Arc::new(ListenerRegistry::new()),
        )
    }

    /// Opens (or creates) a journal file at `path`.
    pub fn open_file(
        path: &Path,
        config: StoreConfig,
        listeners: Arc<ListenerRegistry>,
    ) -> CoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::open(config, Box::new(backend), listeners)
    }

    /// Registry notified after every committed ingestion batch.
    #[must_use]
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Ingests a batch of raw payloads as one transaction.
    ///
    /// Revisions `max+1, max+2, …` are assigned in batch order. Any
    /// malformed payload rejects the whole batch with
    /// [`CoreError::IngestionFailed`] and nothing is written. On success the
    /// registry is notified with the new headers before the writer lock is
    /// released, so notifications arrive in commit order.
    pub fn upsert_batch(&self, payloads: Vec<Value>) -> CoreResult<Vec<Header>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let now = unix_now();
        let drafts = payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| {
                Draft::from_payload(payload, now)
                    .map_err(|reason| CoreError::ingestion_failed(index, reason))
            })
            .collect::<CoreResult<Vec<_>>>()?;

        let mut journal = self.journal.lock();

        let mut allocator = RevisionAllocator::starting_after(self.tables.read().max_revision());
        let rows: Vec<JournalRow> = drafts
            .into_iter()
            .map(|draft| {
                let (header, body) = draft.commit(allocator.allocate());
                JournalRow { header, body }
            })
            .collect();
        self.check_revision_collisions(&rows)?;

        let mut prepared = Vec::with_capacity(rows.len());
        for row in &rows {
            prepared.push((row.header.clone(), encode_compressed(&row.body)?));
        }

        journal.append(&JournalEntry::Upsert { rows })?;

        let headers: Vec<Header> = prepared.iter().map(|(h, _)| h.clone()).collect();
        {
            let mut tables = self.tables.write();
            for (header, compressed) in prepared {
                tables.put(header, compressed);
            }
        }

        if let (Some(first), Some(last)) = (headers.first(), headers.last()) {
            tracing::debug!(
                count = headers.len(),
                first = first.rev.as_u64(),
                last = last.rev.as_u64(),
                "batch committed"
            );
        }

        let report = self.listeners.notify(&headers);
        if report.failed > 0 {
            tracing::debug!(failed = report.failed, "some listeners rejected the batch");
        }
        self.maybe_compact(&mut journal);
        drop(journal);

        Ok(headers)
    }

    /// After a wrap a fresh revision could collide with a surviving header
    /// that this batch does not overwrite. The revision index is unique.
    fn check_revision_collisions(&self, rows: &[JournalRow]) -> CoreResult<()> {
        let tables = self.tables.read();
        let batch_ids: HashSet<&DocumentId> = rows.iter().map(|r| &r.header.id).collect();
        for (index, row) in rows.iter().enumerate() {
            if let Some(existing) = tables.headers.get(&row.header.rev) {
                if !batch_ids.contains(&existing.id) {
                    return Err(CoreError::ingestion_failed(
                        index,
                        format!("revision {} already held by {}", row.header.rev, existing.id),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Headers ordered by ascending revision; with `from`, only revisions
    /// strictly greater than it.
    #[must_use]
    pub fn get_headers(&self, from: Option<Revision>) -> Vec<Header> {
        let tables = self.tables.read();
        match from {
            None => tables.headers.values().cloned().collect(),
            Some(rev) => tables
                .headers
                .range((std::ops::Bound::Excluded(rev), std::ops::Bound::Unbounded))
                .map(|(_, h)| h.clone())
                .collect(),
        }
    }

    /// Bodies for the identities currently present, in first-requested
    /// order. Unknown and repeated identities are skipped.
    pub fn get_documents(&self, ids: &[DocumentId]) -> CoreResult<Vec<Value>> {
        let tables = self.tables.read();
        let mut seen = HashSet::with_capacity(ids.len());
        let mut documents = Vec::new();
        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            if let Some(row) = tables.bodies.get(id) {
                documents.push(decode_compressed(&row.compressed)?);
            }
        }
        Ok(documents)
    }

    /// Removes header and body rows for `ids` and returns how many existed.
    ///
    /// Deletions are not announced to listeners: a client holding a deleted
    /// identity keeps it until it resynchronizes from scratch.
    pub fn delete(&self, ids: &[DocumentId]) -> CoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut journal = self.journal.lock();
        journal.append(&JournalEntry::Delete { ids: ids.to_vec() })?;

        let removed = {
            let mut tables = self.tables.write();
            ids.iter().filter(|id| tables.remove(id)).count()
        };
        tracing::info!(requested = ids.len(), removed, "documents deleted");
        self.maybe_compact(&mut journal);
        Ok(removed)
    }

    /// Rewrites the journal as one snapshot record of the live rows,
    /// dropping overwritten bodies and deleted identities.
    ///
    /// Blocks ingestion while it runs. Readers are not blocked.
    pub fn compact(&self) -> CoreResult<CompactReport> {
        let mut journal = self.journal.lock();
        self.compact_locked(&mut journal)
    }

    fn compact_locked(&self, journal: &mut Journal) -> CoreResult<CompactReport> {
        let before_bytes = journal.size()?;
        let rows = self.tables.read().snapshot_rows()?;
        let documents = rows.len();

        let entries = if rows.is_empty() {
            Vec::new()
        } else {
            vec![JournalEntry::Snapshot { rows }]
        };
        let after_bytes = journal.rewrite(&entries)?;

        tracing::info!(before_bytes, after_bytes, documents, "journal compacted");
        Ok(CompactReport {
            before_bytes,
            after_bytes,
            documents,
        })
    }

    /// Compacts if the journal has outgrown the live data. The commit that
    /// triggered it is already durable, so a failure is only logged.
    fn maybe_compact(&self, journal: &mut Journal) {
        let journal_bytes = match journal.size() {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(error = %e, "cannot size journal");
                return;
            }
        };
        let live_bytes = self.tables.read().body_bytes;
        if !self.config.should_compact(journal_bytes, live_bytes) {
            return;
        }
        if let Err(e) = self.compact_locked(journal) {
            tracing::warn!(error = %e, journal_bytes, "automatic compaction failed");
        }
    }

    /// Highest revision present, `None` for an empty store.
    #[must_use]
    pub fn max_revision(&self) -> Option<Revision> {
        self.tables.read().max_revision()
    }

    /// Lowest revision whose header timestamp is at or after `timestamp`.
    #[must_use]
    pub fn first_revision_since(&self, timestamp: f64) -> Option<Revision> {
        self.tables
            .read()
            .headers
            .values()
            .find(|h| h.timestamp >= timestamp)
            .map(|h| h.rev)
    }

    /// Number of live documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().bodies.len()
    }

    /// Returns true if the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.read().bodies.is_empty()
    }

    /// Current store figures.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let journal_bytes = self.journal.lock().size()?;
        let tables = self.tables.read();
        Ok(StoreStats {
            documents: tables.bodies.len(),
            max_revision: tables.max_revision(),
            journal_bytes,
            body_bytes: tables.body_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{HeaderListener, ListenerError};
    use serde_json::json;
    use tempfile::tempdir;

    fn revs(headers: &[Header]) -> Vec<u64> {
        headers.iter().map(|h| h.rev.as_u64()).collect()
    }

    #[test]
    fn batch_gets_consecutive_revisions() {
        let store = DocumentStore::open_in_memory().unwrap();
        let first = store
            .upsert_batch(vec![json!({"type": "a"}), json!({"type": "b"})])
            .unwrap();
        assert_eq!(revs(&first), vec![1, 2]);

        let second = store
            .upsert_batch(vec![json!({"type": "c"}), json!({"type": "d"}), json!({"type": "e"})])
            .unwrap();
        assert_eq!(revs(&second), vec![3, 4, 5]);
        assert_eq!(store.max_revision(), Some(Revision::new(5)));
    }

    #[test]
    fn rewrite_replaces_header_revision() {
        let store = DocumentStore::open_in_memory().unwrap();
        store
            .upsert_batch(vec![json!({"_id": "x", "tag": "old"}), json!({"_id": "y"})])
            .unwrap();
        store
            .upsert_batch(vec![json!({"_id": "x", "tag": "new"})])
            .unwrap();

        let headers = store.get_headers(None);
        assert_eq!(revs(&headers), vec![2, 3]);
        assert_eq!(store.len(), 2);

        let docs = store.get_documents(&[DocumentId::from("x")]).unwrap();
        assert_eq!(docs[0]["tag"], json!("new"));
        assert_eq!(docs[0]["_rev"], json!(3));
    }

    #[test]
    fn cursor_is_exclusive() {
        let store = DocumentStore::open_in_memory().unwrap();
        store
            .upsert_batch((0..5).map(|i| json!({"run": i})).collect())
            .unwrap();

        assert_eq!(revs(&store.get_headers(Some(Revision::new(2)))), vec![3, 4, 5]);
        assert!(store.get_headers(Some(Revision::new(5))).is_empty());
        assert!(store.get_headers(Some(Revision::new(99))).is_empty());
        assert_eq!(store.get_headers(None).len(), 5);
    }

    #[test]
    fn malformed_payload_rolls_back_batch() {
        let store = DocumentStore::open_in_memory().unwrap();
        store.upsert_batch(vec![json!({"type": "a"})]).unwrap();
        let before = store.stats().unwrap();

        let err = store
            .upsert_batch(vec![json!({"type": "b"}), json!(17), json!({"type": "c"})])
            .unwrap_err();
        assert!(matches!(err, CoreError::IngestionFailed { index: 1, .. }));

        assert_eq!(store.stats().unwrap(), before);
        assert_eq!(store.get_headers(None).len(), 1);
    }

    #[test]
    fn documents_skip_unknown_ids() {
        let store = DocumentStore::open_in_memory().unwrap();
        store
            .upsert_batch(vec![json!({"_id": "a"}), json!({"_id": "b"})])
            .unwrap();

        let ids = [
            DocumentId::from("b"),
            DocumentId::from("ghost"),
            DocumentId::from("a"),
            DocumentId::from("b"),
        ];
        let docs = store.get_documents(&ids).unwrap();
        let got: Vec<_> = docs.iter().map(|d| d["_id"].clone()).collect();
        assert_eq!(got, vec![json!("b"), json!("a")]);
        assert!(store.get_documents(&[]).unwrap().is_empty());
    }

    #[derive(Default)]
    struct Counter {
        batches: parking_lot::Mutex<Vec<usize>>,
    }

    impl HeaderListener for Counter {
        fn update_headers(&self, headers: &[Header]) -> Result<(), ListenerError> {
            self.batches.lock().push(headers.len());
            Ok(())
        }
    }

    #[test]
    fn delete_is_silent() {
        let store = DocumentStore::open_in_memory().unwrap();
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn HeaderListener> = counter.clone();
        store.listeners().register(&listener);

        store
            .upsert_batch(vec![json!({"_id": "a"}), json!({"_id": "b"})])
            .unwrap();
        let removed = store
            .delete(&[DocumentId::from("a"), DocumentId::from("nope")])
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(*counter.batches.lock(), vec![2]);
        assert_eq!(revs(&store.get_headers(None)), vec![2]);
    }

    #[test]
    fn empty_batch_does_not_notify() {
        let store = DocumentStore::open_in_memory().unwrap();
        let counter = Arc::new(Counter::default());
        let listener: Arc<dyn HeaderListener> = counter.clone();
        store.listeners().register(&listener);

        assert!(store.upsert_batch(Vec::new()).unwrap().is_empty());
        assert!(counter.batches.lock().is_empty());
    }

    #[test]
    fn first_revision_since_timestamp() {
        let store = DocumentStore::open_in_memory().unwrap();
        store
            .upsert_batch(vec![
                json!({"timestamp": 100.0}),
                json!({"timestamp": 300.0}),
                json!({"timestamp": 200.0}),
            ])
            .unwrap();

        assert_eq!(store.first_revision_since(150.0), Some(Revision::new(2)));
        assert_eq!(store.first_revision_since(50.0), Some(Revision::new(1)));
        assert_eq!(store.first_revision_since(301.0), None);
    }

    #[test]
    fn reopen_restores_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.journal");
        let registry = Arc::new(ListenerRegistry::new());

        {
            let store =
                DocumentStore::open_file(&path, StoreConfig::default(), Arc::clone(&registry))
                    .unwrap();
            store
                .upsert_batch(vec![json!({"_id": "a"}), json!({"_id": "b"})])
                .unwrap();
            store.upsert_batch(vec![json!({"_id": "a", "tag": "v2"})]).unwrap();
            store.delete(&[DocumentId::from("b")]).unwrap();
        }

        let store = DocumentStore::open_file(&path, StoreConfig::default(), registry).unwrap();
        assert_eq!(revs(&store.get_headers(None)), vec![3]);
        let docs = store.get_documents(&[DocumentId::from("a")]).unwrap();
        assert_eq!(docs[0]["tag"], json!("v2"));

        let next = store.upsert_batch(vec![json!({"_id": "c"})]).unwrap();
        assert_eq!(revs(&next), vec![4]);
    }

    #[test]
    fn concurrent_batches_never_interleave() {
        let store = Arc::new(DocumentStore::open_in_memory().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|i| {
                            let batch = (0..5).map(|j| json!({"tag": format!("{t}-{i}-{j}")})).collect();
                            revs(&store.upsert_batch(batch).unwrap())
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            for block in handle.join().unwrap() {
                let expected: Vec<u64> = (block[0]..block[0] + 5).collect();
                assert_eq!(block, expected);
            }
        }
        assert_eq!(store.max_revision(), Some(Revision::new(200)));
    }

    #[test]
    fn compact_keeps_only_live_rows() {
        let test_dir = tempdir().unwrap();
        let path = test_dir.path().join("docs.journal");
        let config = StoreConfig::default().compact_ratio(None);

        {
            let store =
                DocumentStore::open_file(&path, config.clone(), Arc::new(ListenerRegistry::new()))
                    .unwrap();
            for i in 0..50 {
                store
                    .upsert_batch(vec![json!({"_id": "gone"}), json!({"_id": "same", "run": i})])
                    .unwrap();
            }
            store.delete(&[DocumentId::from("gone")]).unwrap();
            let before = store.stats().unwrap();

            let report = store.compact().unwrap();
            assert_eq!(report.before_bytes, before.journal_bytes);
            assert_eq!(report.documents, 1);
            assert!(report.after_bytes * 10 < report.before_bytes);
            assert_eq!(store.stats().unwrap().journal_bytes, report.after_bytes);

            let next = store.upsert_batch(vec![json!({"_id": "other"})]).unwrap();
            assert_eq!(revs(&next), vec![101]);
        }

        let store =
            DocumentStore::open_file(&path, config, Arc::new(ListenerRegistry::new())).unwrap();
        assert_eq!(revs(&store.get_headers(None)), vec![100, 101]);
        let docs = store.get_documents(&[DocumentId::from("same")]).unwrap();
        assert_eq!(docs[0]["run"], json!(49));
        assert_eq!(docs[0]["_rev"], json!(100));
        assert!(store.get_documents(&[DocumentId::from("gone")]).unwrap().is_empty());
    }

    #[test]
    fn repeated_overwrites_keep_journal_bounded() {
        let config = StoreConfig::default()
            .sync_on_commit(false)
            .compact_min_bytes(4096);
        let store = DocumentStore::open(
            config,
            Box::new(InMemoryBackend::new()),
            Arc::new(ListenerRegistry::new()),
        )
        .unwrap();

        let mut peak = 0;
        for i in 0..2000 {
            store
                .upsert_batch(vec![json!({"_id": "same", "run": i, "hostname": "sensor-7"})])
                .unwrap();
            peak = peak.max(store.stats().unwrap().journal_bytes);
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.documents, 1);
        assert!(peak < 4096 + 1024, "journal grew to {peak} bytes");
        assert_eq!(store.max_revision(), Some(Revision::new(2000)));
    }

    #[test]
    fn compacting_empty_store_leaves_empty_journal() {
        let store = DocumentStore::open_in_memory().unwrap();
        store.upsert_batch(vec![json!({"_id": "a"})]).unwrap();
        store.delete(&[DocumentId::from("a")]).unwrap();

        let report = store.compact().unwrap();
        assert_eq!(report.after_bytes, 0);
        assert_eq!(report.documents, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn body_bytes_track_overwrites_and_deletes() {
        let store = DocumentStore::open_in_memory().unwrap();
        store.upsert_batch(vec![json!({"_id": "a"})]).unwrap();
        let one = store.stats().unwrap().body_bytes;
        assert!(one > 0);

        store.upsert_batch(vec![json!({"_id": "a"})]).unwrap();
        store.upsert_batch(vec![json!({"_id": "b"})]).unwrap();
        let two = store.stats().unwrap().body_bytes;
        assert!(two > one && two < one * 3);

        store.delete(&[DocumentId::from("a"), DocumentId::from("b")]).unwrap();
        assert_eq!(store.stats().unwrap().body_bytes, 0);
    }
}
