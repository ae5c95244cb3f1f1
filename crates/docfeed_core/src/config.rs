//! Store configuration.

/// Configuration for opening a [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether every committed batch is synced to disk before the call
    /// returns (safer but slower).
    pub sync_on_commit: bool,

    /// Drop a torn or checksum-failing journal tail on open instead of
    /// refusing to start.
    pub truncate_torn_tail: bool,

    /// Compact once the journal is this many times larger than the live
    /// bodies. `None` leaves compaction to explicit calls.
    pub compact_ratio: Option<f64>,

    /// Journals smaller than this are never compacted automatically.
    pub compact_min_bytes: u64,
}

/// Default automatic compaction ratio.
pub const DEFAULT_COMPACT_RATIO: f64 = 4.0;

/// Default floor below which the journal is left alone (1 MiB).
pub const DEFAULT_COMPACT_MIN_BYTES: u64 = 1024 * 1024;

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_on_commit: true,
            truncate_torn_tail: true,
            compact_ratio: Some(DEFAULT_COMPACT_RATIO),
            compact_min_bytes: DEFAULT_COMPACT_MIN_BYTES,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether a torn journal tail is truncated on open.
    #[must_use]
    pub const fn truncate_torn_tail(mut self, value: bool) -> Self {
        self.truncate_torn_tail = value;
        self
    }

    /// Sets the automatic compaction ratio, or disables it with `None`.
    #[must_use]
    pub fn compact_ratio(mut self, ratio: Option<f64>) -> Self {
        self.compact_ratio = ratio;
        self
    }

    /// Sets the journal size below which automatic compaction never runs.
    #[must_use]
    pub fn compact_min_bytes(mut self, bytes: u64) -> Self {
        self.compact_min_bytes = bytes;
        self
    }

    /// Whether a journal of `journal_bytes` holding `live_bytes` of bodies
    /// is due for compaction.
    #[must_use]
    pub fn should_compact(&self, journal_bytes: u64, live_bytes: u64) -> bool {
        match self.compact_ratio {
            Some(ratio) if journal_bytes >= self.compact_min_bytes => {
                journal_bytes as f64 > live_bytes as f64 * ratio
            }
            _ => false,
        }
    }
}
