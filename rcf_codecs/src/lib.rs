mod lz4_codec;
mod mix;
mod passthrough;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use mix::BlockPolicy;
pub use passthrough::RawCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use thiserror::Error;

// ── Block algorithm tags ───────────────────────────────────────────────────
//
// One tag per block-index entry. Tags are part of the on-disk format; only
// append new ones.

pub const ALGO_RAW: u16 = 0;
pub const ALGO_LZ4: u16 = 1;
pub const ALGO_ZSTD: u16 = 2;

/// Error type for the codec layer.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("lz4 block error: {0}")]
    Lz4(String),

    #[error("zstd block error: {0}")]
    Zstd(#[from] std::io::Error),

    #[error("block decompressed to {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("unknown block algorithm tag {0}")]
    UnknownTag(u16),
}

/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Is identified by a stable numeric `algo_tag()` stored per block in the
///   column's block index.
/// - Must compress/decompress individual blocks independently — no
///   cross-block state is permitted. This is the invariant that makes random
///   access into a column possible.
pub trait Codec: Send + Sync {
    /// Stable algorithm tag stored in the block index.
    fn algo_tag(&self) -> u16;

    /// Compress a single independent block.
    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompress a single independent block.
    ///
    /// `raw_len` is the uncompressed block length recorded by the writer;
    /// implementations must fail rather than return a buffer of any other
    /// size.
    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError>;
}

/// Resolve a codec from its on-disk block tag.
///
/// Called by the read path while walking a block index, so any mix of tags
/// within one column stream can be decoded.
pub fn codec_by_tag(tag: u16) -> Result<Arc<dyn Codec>, CodecError> {
    match tag {
        ALGO_RAW => Ok(Arc::new(RawCodec)),
        ALGO_LZ4 => Ok(Arc::new(Lz4Codec)),
        ALGO_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        other => Err(CodecError::UnknownTag(other)),
    }
}
