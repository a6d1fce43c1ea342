use crate::{Codec, CodecError, ALGO_ZSTD};

/// Zstandard block codec.
///
/// Each block is compressed independently at the configured level
/// (1 = fast / larger, 22 = slow / smallest). The composite mixing policy
/// applies this codec to a bounded fraction of blocks so decode latency
/// stays predictable.
pub struct ZstdCodec {
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn algo_tag(&self) -> u16 {
        ALGO_ZSTD
    }

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(zstd::bulk::compress(raw, self.level)?)
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError> {
        let out = zstd::bulk::decompress(compressed, raw_len)?;
        if out.len() != raw_len {
            return Err(CodecError::SizeMismatch {
                expected: raw_len,
                actual: out.len(),
            });
        }
        Ok(out)
    }
}
