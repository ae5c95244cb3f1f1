//! Compact command implementation.

use docfeed_core::StoreConfig;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(path, StoreConfig::default())?;
    let report = store.compact()?;
    println!(
        "Compacted journal: {} -> {} bytes ({} document(s))",
        report.before_bytes, report.after_bytes, report.documents
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shrinks_overwritten_journal() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = super::super::open_store(dir.path(), StoreConfig::default()).unwrap();
            for run in 0..20 {
                store.upsert_batch(vec![json!({"_id": "a", "run": run})]).unwrap();
            }
        }
        let journal = super::super::journal_path(dir.path());
        let before = std::fs::metadata(&journal).unwrap().len();

        run(dir.path()).unwrap();

        assert!(std::fs::metadata(&journal).unwrap().len() < before);
        let store = super::super::open_store(dir.path(), StoreConfig::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.max_revision().unwrap().as_u64(), 20);
    }
}
