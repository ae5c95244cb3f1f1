//! Revisions and the batch revision allocator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Revisions live in the low 63 bits; allocation wraps inside that range.
const REVISION_MASK: u64 = (1 << 63) - 1;

/// Global sequence number marking ingestion order.
///
/// Every document write receives a fresh revision. Higher revisions were
/// written later, except across the (practically unreachable) wrap at 2^63.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Creates a revision from its raw value.
    #[must_use]
    pub const fn new(rev: u64) -> Self {
        Self(rev)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The revision after this one, modulo 2^63.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1) & REVISION_MASK)
    }

    /// The revision before this one, or `None` for revision 0.
    #[must_use]
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev:{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(rev: u64) -> Self {
        Self(rev)
    }
}

/// Hands out a contiguous block of revisions for one ingestion batch.
///
/// The allocator is created from the store's current maximum while the
/// writer lock is held, so two batches can never interleave their blocks.
#[derive(Debug, Clone)]
pub struct RevisionAllocator {
    last: Revision,
    issued: usize,
}

impl RevisionAllocator {
    /// Starts allocating after `max`; an empty store starts at revision 1.
    #[must_use]
    pub fn starting_after(max: Option<Revision>) -> Self {
        Self {
            last: max.unwrap_or(Revision(0)),
            issued: 0,
        }
    }

    /// Issues the next revision.
    pub fn allocate(&mut self) -> Revision {
        self.last = self.last.next();
        self.issued += 1;
        self.last
    }

    /// Number of revisions issued so far.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued
    }
}
