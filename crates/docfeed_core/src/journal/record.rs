//! Journal record framing.
//!
//! ```text
//! magic "DFJR" (4) | version u16 (2) | kind u8 (1) | len u32 (4) | payload (len) | crc32 (4)
//! ```
//!
//! Integers are little-endian. The CRC covers everything before it. The
//! payload is the compressed JSON encoding of a [`JournalEntry`].

use crate::codec::{decode_compressed, encode_compressed};
use crate::error::{CoreError, CoreResult};
use crate::header::Header;
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Magic bytes opening every record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"DFJR";

/// Current record format version.
pub const JOURNAL_VERSION: u16 = 1;

/// magic (4) + version (2) + kind (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// Record kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    /// A committed ingestion batch.
    Upsert = 1,
    /// An administrative deletion.
    Delete = 2,
    /// Every live row, written by compaction. Replaces all prior state.
    Snapshot = 3,
}

impl EntryKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Upsert),
            2 => Some(Self::Delete),
            3 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// One stored row: the header plus the body it projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRow {
    /// Header as committed.
    pub header: Header,
    /// Body with header fields written back.
    pub body: Map<String, Value>,
}

/// A single durable transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// Rows written by one ingestion batch, in revision order.
    Upsert {
        /// The batch rows.
        rows: Vec<JournalRow>,
    },
    /// Identities removed by an administrative delete.
    Delete {
        /// Removed identities.
        ids: Vec<DocumentId>,
    },
    /// The complete live table at compaction time, in revision order.
    Snapshot {
        /// Live rows.
        rows: Vec<JournalRow>,
    },
}

impl JournalEntry {
    /// Record kind for this entry.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Upsert { .. } => EntryKind::Upsert,
            Self::Delete { .. } => EntryKind::Delete,
            Self::Snapshot { .. } => EntryKind::Snapshot,
        }
    }

    /// Encodes the entry into a complete framed record.
    pub fn to_frame(&self) -> CoreResult<Vec<u8>> {
        let payload = encode_compressed(self)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            CoreError::Compression(format!("journal payload too large: {} bytes", payload.len()))
        })?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&JOURNAL_MAGIC);
        frame.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        frame.push(self.kind() as u8);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

/// Result of reading one frame out of a byte buffer.
#[derive(Debug)]
pub(crate) enum Frame {
    /// A complete, verified record and its total length.
    Entry(JournalEntry, usize),
    /// The buffer ends before the frame does.
    Torn,
    /// Bad magic or checksum.
    Damaged(String),
}

/// Reads the frame starting at `buf[0]`. `offset` is only used for errors.
pub(crate) fn read_frame(buf: &[u8], offset: u64) -> CoreResult<Frame> {
    if buf.len() < HEADER_SIZE {
        return Ok(Frame::Torn);
    }
    if buf[0..4] != JOURNAL_MAGIC {
        return Ok(Frame::Damaged(format!("bad magic at offset {offset}")));
    }

    let version = u16::from_le_bytes([buf[4], buf[5]]);
    if version > JOURNAL_VERSION {
        return Err(CoreError::journal_corruption(
            offset,
            format!("unsupported record version {version}"),
        ));
    }

    let kind_byte = buf[6];
    let len = u32::from_le_bytes([buf[7], buf[8], buf[9], buf[10]]) as usize;
    let total = HEADER_SIZE + len + CRC_SIZE;
    if buf.len() < total {
        return Ok(Frame::Torn);
    }

    let crc_at = HEADER_SIZE + len;
    let stored = u32::from_le_bytes([buf[crc_at], buf[crc_at + 1], buf[crc_at + 2], buf[crc_at + 3]]);
    let computed = compute_crc32(&buf[..crc_at]);
    if stored != computed {
        return Ok(Frame::Damaged(format!(
            "checksum mismatch at offset {offset}: stored {stored:08x}, computed {computed:08x}"
        )));
    }

    let kind = EntryKind::from_byte(kind_byte).ok_or_else(|| {
        CoreError::journal_corruption(offset, format!("unknown record kind {kind_byte}"))
    })?;
    let entry: JournalEntry = decode_compressed(&buf[HEADER_SIZE..crc_at])
        .map_err(|e| CoreError::journal_corruption(offset, e.to_string()))?;
    if entry.kind() != kind {
        return Err(CoreError::journal_corruption(
            offset,
            "record kind does not match payload",
        ));
    }

    Ok(Frame::Entry(entry, total))
}

/// CRC32 (IEEE polynomial).
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}
