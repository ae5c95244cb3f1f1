//! Storage backend trait.

use crate::error::StorageResult;

/// An append-only byte store holding the document journal.
///
/// Records are only ever appended. Existing bytes change only through
/// [`truncate`](StorageBackend::truncate), which cuts a torn tail after a
/// crash, and [`replace`](StorageBackend::replace), which swaps in a
/// compacted journal.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at
/// - `read_at` returns exactly the bytes previously appended there
/// - after `sync` returns, appended data survives process termination
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if the range is not fully inside the store.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it starts at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to durable media.
    fn sync(&mut self) -> StorageResult<()>;

    /// Current size in bytes (the offset of the next append).
    fn size(&self) -> StorageResult<u64>;

    /// Drops everything at and after `new_size`.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` is larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Replaces the whole contents with `data`.
    ///
    /// After a crash the store holds either the old or the new contents,
    /// never a mix of both.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads the whole store. Used when replaying the journal on open.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }
}
