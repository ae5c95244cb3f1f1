//! Append-only transaction journal.
//!
//! Each committed ingestion batch or deletion is one framed record, so a
//! batch is either fully present after a crash or not present at all.

mod record;

pub use record::{compute_crc32, EntryKind, JournalEntry, JournalRow, JOURNAL_MAGIC, JOURNAL_VERSION};

use crate::error::{CoreError, CoreResult};
use docfeed_storage::StorageBackend;
use record::{read_frame, Frame};

/// Writer side of the journal. Owned by the store's single-writer lock.
pub struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl Journal {
    /// Opens the journal and returns every committed entry in order.
    ///
    /// With `truncate_torn_tail`, an incomplete or damaged tail is cut off
    /// and the entries before it are returned; otherwise it is an error.
    pub fn open(
        mut backend: Box<dyn StorageBackend>,
        sync_on_commit: bool,
        truncate_torn_tail: bool,
    ) -> CoreResult<(Self, Vec<JournalEntry>)> {
        let bytes = backend.read_all()?;
        let mut entries = Vec::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            let offset = pos as u64;
            match read_frame(&bytes[pos..], offset)? {
                Frame::Entry(entry, len) => {
                    entries.push(entry);
                    pos += len;
                }
                Frame::Torn | Frame::Damaged(_) if truncate_torn_tail => {
                    tracing::warn!(
                        offset,
                        dropped = bytes.len() - pos,
                        "discarding torn journal tail"
                    );
                    backend.truncate(offset)?;
                    break;
                }
                Frame::Torn => {
                    return Err(CoreError::journal_corruption(offset, "incomplete record"));
                }
                Frame::Damaged(message) => {
                    return Err(CoreError::journal_corruption(offset, message));
                }
            }
        }

        tracing::debug!(entries = entries.len(), bytes = pos, "journal replayed");
        Ok((
            Self {
                backend,
                sync_on_commit,
            },
            entries,
        ))
    }

    /// Appends `entry` as one record and makes it durable.
    ///
    /// If the write fails part way the journal is cut back to where it was,
    /// so a failed commit never leaves a partial record behind.
    pub fn append(&mut self, entry: &JournalEntry) -> CoreResult<u64> {
        let frame = entry.to_frame()?;
        let start = self.backend.size()?;

        if let Err(e) = self.write_frame(&frame) {
            if let Err(rollback) = self.backend.truncate(start) {
                tracing::error!(error = %rollback, "failed to roll back partial journal record");
            }
            return Err(e);
        }
        Ok(start)
    }

    fn write_frame(&mut self, frame: &[u8]) -> CoreResult<()> {
        self.backend.append(frame)?;
        self.backend.flush()?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Replaces the whole journal with `entries`.
    ///
    /// The backend swaps the contents atomically, so a crash leaves either
    /// the old journal or the rewritten one. Returns the new size.
    pub fn rewrite(&mut self, entries: &[JournalEntry]) -> CoreResult<u64> {
        let mut bytes = Vec::new();
        for entry in entries {
            bytes.extend_from_slice(&entry.to_frame()?);
        }
        self.backend.replace(&bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Size of the journal in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }
}
