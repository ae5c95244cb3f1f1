//! Crash recovery testing for DocFeed.
//!
//! A crash mid-append leaves a partial record at the end of the journal.
//! These helpers damage a journal file the way such a crash would so tests
//! can check what the store recovers on the next open.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Where to damage the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// The last record was cut short by `n` bytes.
    TornTail(u64),
    /// Garbage was appended after the last complete record.
    TrailingGarbage,
    /// One byte near the end of the last record flipped on disk.
    FlippedTailByte,
}

/// Returns the journal length in bytes.
pub fn journal_len(path: &Path) -> u64 {
    std::fs::metadata(path)
        .expect("Failed to stat journal")
        .len()
}

/// Applies `point` to the journal at `path`.
pub fn damage_journal(path: &Path, point: CrashPoint) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .expect("Failed to open journal");
    let len = file.metadata().expect("Failed to stat journal").len();

    match point {
        CrashPoint::TornTail(n) => {
            file.set_len(len.saturating_sub(n))
                .expect("Failed to truncate journal");
        }
        CrashPoint::TrailingGarbage => {
            file.seek(SeekFrom::End(0)).expect("Failed to seek");
            file.write_all(b"DFJR\x01\x00\x01\xff\xff")
                .expect("Failed to append garbage");
        }
        CrashPoint::FlippedTailByte => {
            assert!(len >= 6, "journal too short to damage");
            let at = len - 6;
            let mut byte = [0u8; 1];
            file.seek(SeekFrom::Start(at)).expect("Failed to seek");
            file.read_exact(&mut byte).expect("Failed to read");
            file.seek(SeekFrom::Start(at)).expect("Failed to seek");
            file.write_all(&[byte[0] ^ 0xff]).expect("Failed to write");
        }
    }
    file.sync_all().expect("Failed to sync journal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{docs, TestStore};

    fn two_batch_store() -> (TestStore, u64) {
        let test_store = TestStore::file();
        test_store.upsert_batch(docs(3)).unwrap();
        let after_first = journal_len(test_store.path().unwrap());
        test_store
            .upsert_batch(vec![crate::fixtures::doc("late", "state")])
            .unwrap();
        (test_store, after_first)
    }

    #[test]
    fn torn_last_batch_is_dropped_whole() {
        let (test_store, after_first) = two_batch_store();
        damage_journal(test_store.path().unwrap(), CrashPoint::TornTail(7));

        let test_store = test_store.reopen();
        assert_eq!(test_store.len(), 3);
        assert_eq!(test_store.max_revision().map(|r| r.as_u64()), Some(3));
        assert_eq!(journal_len(test_store.path().unwrap()), after_first);
    }

    #[test]
    fn trailing_garbage_is_cut() {
        let (test_store, _) = two_batch_store();
        let before = journal_len(test_store.path().unwrap());
        damage_journal(test_store.path().unwrap(), CrashPoint::TrailingGarbage);

        let test_store = test_store.reopen();
        assert_eq!(test_store.len(), 4);
        assert_eq!(journal_len(test_store.path().unwrap()), before);
    }

    #[test]
    fn flipped_byte_drops_last_batch() {
        let (test_store, _) = two_batch_store();
        damage_journal(test_store.path().unwrap(), CrashPoint::FlippedTailByte);

        let test_store = test_store.reopen();
        assert_eq!(test_store.len(), 3);

        let next = test_store.upsert_batch(docs(1)).unwrap();
        assert_eq!(next[0].rev.as_u64(), 4);
    }
}
