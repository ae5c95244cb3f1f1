//! Drop command implementation.

use docfeed_core::{DocumentId, StoreConfig};
use std::path::Path;

/// Runs the drop command.
pub fn run(path: &Path, ids: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(path, StoreConfig::default())?;
    let ids: Vec<DocumentId> = ids.iter().map(|id| DocumentId::new(id.as_str())).collect();
    let removed = store.delete(&ids)?;
    println!("Deleted {removed} of {} document(s)", ids.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_known_ids_only() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = super::super::open_store(dir.path(), StoreConfig::default()).unwrap();
            store
                .upsert_batch(vec![json!({"_id": "a"}), json!({"_id": "b"})])
                .unwrap();
        }

        run(dir.path(), &["a".to_string(), "zzz".to_string()]).unwrap();

        let store = super::super::open_store(dir.path(), StoreConfig::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_headers(None)[0].id, DocumentId::new("b"));
    }
}
