//! CLI command implementations.

pub mod compact;
pub mod drop;
pub mod headers;
pub mod ingest;
pub mod inspect;
pub mod replay;
pub mod serve;

use docfeed_core::{DocumentStore, ListenerRegistry, StoreConfig};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Journal file name inside the data directory.
pub const JOURNAL_FILE: &str = "docs.journal";

/// Journal path for a data directory.
pub fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir.join(JOURNAL_FILE)
}

/// Opens (or creates) the store in `data_dir`.
pub fn open_store(
    data_dir: &Path,
    config: StoreConfig,
) -> Result<DocumentStore, Box<dyn std::error::Error>> {
    let store = DocumentStore::open_file(
        &journal_path(data_dir),
        config,
        Arc::new(ListenerRegistry::new()),
    )?;
    Ok(store)
}

/// Reads a whole input file, `-` meaning stdin.
pub fn read_input(file: &Path) -> Result<String, Box<dyn std::error::Error>> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(file)?)
    }
}
