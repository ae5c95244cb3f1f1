//! Concurrent ingestion stress helpers.

use docfeed_core::DocumentStore;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for a concurrent ingestion run.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of writer threads.
    pub writers: usize,
    /// Batches each writer submits.
    pub batches_per_writer: usize,
    /// Payloads per batch.
    pub batch_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            writers: 4,
            batches_per_writer: 50,
            batch_size: 8,
        }
    }
}

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Revisions returned for every committed batch, per writer.
    pub blocks: Vec<Vec<Vec<u64>>>,
    /// Batches that failed.
    pub failed_batches: usize,
    /// Wall time of the run.
    pub duration: Duration,
}

impl StressResult {
    /// Committed batches across all writers.
    pub fn committed_batches(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }

    /// True if every batch received a contiguous run of revisions.
    pub fn blocks_are_contiguous(&self) -> bool {
        self.blocks.iter().flatten().all(|block| {
            block
                .windows(2)
                .all(|pair| pair[1] == pair[0] + 1)
        })
    }

    /// All revisions handed out, sorted.
    pub fn all_revisions(&self) -> Vec<u64> {
        let mut revs: Vec<u64> = self.blocks.iter().flatten().flatten().copied().collect();
        revs.sort_unstable();
        revs
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Committed batches: {}", self.committed_batches());
        println!("Failed batches: {}", self.failed_batches);
        println!("Duration: {:?}", self.duration);
    }
}

/// Runs `config.writers` threads ingesting into `store` at once.
///
/// Each writer uses its own identity space so batches never overwrite each
/// other's documents.
pub fn stress_concurrent_ingest(store: &Arc<DocumentStore>, config: &StressConfig) -> StressResult {
    let start = Instant::now();

    let handles: Vec<_> = (0..config.writers)
        .map(|writer| {
            let store = Arc::clone(store);
            let config = config.clone();
            thread::spawn(move || {
                let mut blocks = Vec::with_capacity(config.batches_per_writer);
                let mut failed = 0usize;
                for batch_no in 0..config.batches_per_writer {
                    let batch = (0..config.batch_size)
                        .map(|i| {
                            json!({
                                "_id": format!("w{writer}-b{batch_no}-{i}"),
                                "type": "stress",
                                "run": writer,
                            })
                        })
                        .collect();
                    match store.upsert_batch(batch) {
                        Ok(headers) => {
                            blocks.push(headers.iter().map(|h| h.rev.as_u64()).collect())
                        }
                        Err(_) => failed += 1,
                    }
                }
                (blocks, failed)
            })
        })
        .collect();

    let mut blocks = Vec::with_capacity(config.writers);
    let mut failed_batches = 0;
    for handle in handles {
        let (writer_blocks, failed) = handle.join().expect("writer thread panicked");
        blocks.push(writer_blocks);
        failed_batches += failed;
    }

    StressResult {
        blocks,
        failed_batches,
        duration: start.elapsed(),
    }
}
