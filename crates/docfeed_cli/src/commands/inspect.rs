//! Inspect command implementation.

use docfeed_core::journal::{Journal, JournalEntry};
use docfeed_core::{DocumentStore, ListenerRegistry, StoreConfig};
use docfeed_storage::{FileBackend, InMemoryBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Journal inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal path.
    pub path: String,
    /// Journal file size in bytes.
    pub journal_size: u64,
    /// Bytes past the last intact record.
    pub torn_bytes: u64,
    /// Committed ingestion batches.
    pub upsert_records: usize,
    /// Rows written across all batches.
    pub upsert_rows: usize,
    /// Administrative deletions.
    pub delete_records: usize,
    /// Rows held in compaction snapshots.
    pub snapshot_rows: usize,
    /// Live documents.
    pub documents: usize,
    /// Highest revision present.
    pub max_revision: Option<u64>,
    /// Sum of compressed body sizes.
    pub body_bytes: u64,
}

/// Runs the inspect command.
///
/// The journal is read into memory first, so a torn tail is reported
/// rather than cut off the file.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let journal_path = super::journal_path(path);
    if !journal_path.exists() {
        return Err(format!("No journal found at {}", journal_path.display()).into());
    }

    let bytes = FileBackend::open(&journal_path)?.read_all()?;
    let result = inspect_bytes(&journal_path.display().to_string(), bytes)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn inspect_bytes(path: &str, bytes: Vec<u8>) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let journal_size = bytes.len() as u64;
    let (journal, entries) = Journal::open(
        Box::new(InMemoryBackend::with_data(bytes.clone())),
        false,
        true,
    )?;

    let mut result = InspectResult {
        path: path.to_string(),
        journal_size,
        torn_bytes: journal_size - journal.size()?,
        upsert_records: 0,
        upsert_rows: 0,
        delete_records: 0,
        snapshot_rows: 0,
        documents: 0,
        max_revision: None,
        body_bytes: 0,
    };
    for entry in &entries {
        match entry {
            JournalEntry::Upsert { rows } => {
                result.upsert_records += 1;
                result.upsert_rows += rows.len();
            }
            JournalEntry::Delete { .. } => result.delete_records += 1,
            JournalEntry::Snapshot { rows } => result.snapshot_rows += rows.len(),
        }
    }

    let store = DocumentStore::open(
        StoreConfig::default().sync_on_commit(false),
        Box::new(InMemoryBackend::with_data(bytes)),
        Arc::new(ListenerRegistry::new()),
    )?;
    let stats = store.stats()?;
    result.documents = stats.documents;
    result.max_revision = stats.max_revision.map(|rev| rev.as_u64());
    result.body_bytes = stats.body_bytes;

    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("Journal: {}", result.path);
    println!("  Size:            {} bytes", result.journal_size);
    if result.torn_bytes > 0 {
        println!("  Torn tail:       {} bytes (dropped on next open)", result.torn_bytes);
    }
    println!("  Upsert records:  {} ({} rows)", result.upsert_records, result.upsert_rows);
    println!("  Delete records:  {}", result.delete_records);
    if result.snapshot_rows > 0 {
        println!("  Snapshot rows:   {}", result.snapshot_rows);
    }
    println!();
    println!("Store:");
    println!("  Documents:       {}", result.documents);
    match result.max_revision {
        Some(rev) => println!("  Max revision:    {rev}"),
        None => println!("  Max revision:    -"),
    }
    println!("  Body bytes:      {}", result.body_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_records_and_reports_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = super::super::open_store(dir.path(), StoreConfig::default()).unwrap();
            store
                .upsert_batch(vec![json!({"_id": "a"}), json!({"_id": "b"})])
                .unwrap();
            store.upsert_batch(vec![json!({"_id": "a"})]).unwrap();
            store
                .delete(&[docfeed_core::DocumentId::new("b")])
                .unwrap();
        }

        let journal_path = super::super::journal_path(dir.path());
        let mut bytes = std::fs::read(&journal_path).unwrap();
        bytes.extend_from_slice(b"DFJR\x01");

        let result = inspect_bytes("journal", bytes).unwrap();
        assert_eq!(result.upsert_records, 2);
        assert_eq!(result.upsert_rows, 3);
        assert_eq!(result.delete_records, 1);
        assert_eq!(result.torn_bytes, 5);
        assert_eq!(result.documents, 1);
        assert_eq!(result.max_revision, Some(3));
        assert_eq!(result.snapshot_rows, 0);
    }

    #[test]
    fn counts_snapshot_rows_after_compaction() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = super::super::open_store(dir.path(), StoreConfig::default()).unwrap();
            store
                .upsert_batch(vec![json!({"_id": "a"}), json!({"_id": "b"})])
                .unwrap();
            store.compact().unwrap();
            store.upsert_batch(vec![json!({"_id": "c"})]).unwrap();
        }

        let bytes = std::fs::read(super::super::journal_path(dir.path())).unwrap();
        let result = inspect_bytes("journal", bytes).unwrap();
        assert_eq!(result.snapshot_rows, 2);
        assert_eq!(result.upsert_records, 1);
        assert_eq!(result.documents, 3);
    }

    #[test]
    fn missing_journal_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), "text").is_err());
    }
}
