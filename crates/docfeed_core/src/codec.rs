//! Compressed JSON encoding shared by stored bodies and journal records.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serializes `value` to JSON and LZ4-compresses it (size-prefixed block).
pub fn encode_compressed<T: Serialize + ?Sized>(value: &T) -> CoreResult<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    Ok(lz4_flex::compress_prepend_size(&json))
}

/// Reverses [`encode_compressed`].
pub fn decode_compressed<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    let json = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| CoreError::Compression(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}
