use lz4_flex::block::{compress, decompress};

use crate::{Codec, CodecError, ALGO_LZ4};

/// LZ4 block codec.
///
/// Fastest decompression of the bundled codecs; the default choice for every
/// block the mixing policies decide to compress at low and mid settings.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn algo_tag(&self) -> u16 {
        ALGO_LZ4
    }

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(compress(raw))
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError> {
        let out = decompress(compressed, raw_len).map_err(|e| CodecError::Lz4(e.to_string()))?;
        if out.len() != raw_len {
            return Err(CodecError::SizeMismatch {
                expected: raw_len,
                actual: out.len(),
            });
        }
        Ok(out)
    }
}
