//! Batch payload codecs.
//!
//! The delivery sink only needs `decode(encode(batch)) == batch`; how the
//! bytes look (plain JSON or compressed) is private to each codec.

use crate::{Batch, CodecError, CodecResult};
use tracing::debug;

/// zstd level used by [`ZstdJsonCodec::default`].
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Serializes batches to bytes and back.
pub trait PayloadCodec: Send + Sync {
    /// Encode a batch into an opaque payload.
    fn encode(&self, batch: &Batch) -> CodecResult<Vec<u8>>;

    /// Decode a payload produced by [`encode`](Self::encode).
    fn decode(&self, bytes: &[u8]) -> CodecResult<Batch>;

    /// MIME type of the encoded payload.
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    /// HTTP `Content-Encoding` of the payload, if any.
    fn content_encoding(&self) -> Option<&'static str> {
        None
    }
}

/// Plain JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode(&self, batch: &Batch) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(batch)?)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Batch> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// JSON compressed with zstd.
#[derive(Debug, Clone, Copy)]
pub struct ZstdJsonCodec {
    level: i32,
}

impl ZstdJsonCodec {
    /// Create a codec with the given zstd compression level.
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdJsonCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ZSTD_LEVEL)
    }
}

impl PayloadCodec for ZstdJsonCodec {
    fn encode(&self, batch: &Batch) -> CodecResult<Vec<u8>> {
        let json = serde_json::to_vec(batch)?;
        let compressed = zstd::encode_all(json.as_slice(), self.level)
            .map_err(|e| CodecError::Compression(e.to_string()))?;

        debug!(
            batch_id = %batch.id(),
            raw_bytes = json.len(),
            compressed_bytes = compressed.len(),
            "Compressed batch payload"
        );

        Ok(compressed)
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Batch> {
        let json = zstd::decode_all(bytes).map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }

    fn content_encoding(&self) -> Option<&'static str> {
        Some("zstd")
    }
}
