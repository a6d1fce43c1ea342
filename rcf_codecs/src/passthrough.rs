use crate::{Codec, CodecError, ALGO_RAW};

/// No-op codec: stores blocks verbatim.
///
/// Raw blocks keep a column seekable at zero CPU cost; the mixing policies
/// interleave them with compressed blocks at low compression settings.
pub struct RawCodec;

impl Codec for RawCodec {
    fn algo_tag(&self) -> u16 {
        ALGO_RAW
    }

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(raw.to_vec())
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>, CodecError> {
        if compressed.len() != raw_len {
            return Err(CodecError::SizeMismatch {
                expected: raw_len,
                actual: compressed.len(),
            });
        }
        Ok(compressed.to_vec())
    }
}
