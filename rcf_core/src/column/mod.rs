//! Column serializers: one write/read pair per logical column type.
//!
//! Each serializer fixes the element size and block size for its type and
//! maps the single `compression` knob onto a block mixing policy before
//! handing the data to the block streamer.

mod factor;
mod logical;
mod numeric;
mod string;

pub(crate) use factor::{read_factor, write_factor};
pub(crate) use logical::{read_logical, write_logical};
pub(crate) use numeric::{
    read_byte, read_double, read_int32, read_int64, write_byte, write_double, write_int32,
    write_int64,
};
pub(crate) use string::{read_character, write_character};

use std::sync::Arc;

use rcf_codecs::{BlockPolicy, Lz4Codec, ZstdCodec};

use crate::error::{Error, Result};

/// ZSTD level applied to the heavy share of composite-mixed blocks.
const ZSTD_MIX_LEVEL: i32 = 20;

/// Map the public `compression` knob in `[0, 100]` onto a block policy.
///
/// - 0: every block raw.
/// - 1..=50: LZ4 on a growing share of blocks (`2c`% at setting `c`), the
///   rest raw — CPU buys storage at fine grain while every block stays
///   independently decodable.
/// - 51..=100: all blocks compressed; ZSTD replaces LZ4 on a growing share
///   (`2(c−50)`%), bounding worst-case decode latency.
pub(crate) fn policy_for(compression: u8) -> Result<BlockPolicy> {
    match compression {
        0 => Ok(BlockPolicy::Uncompressed),
        c @ 1..=50 => Ok(BlockPolicy::Linear {
            codec: Arc::new(Lz4Codec),
            ratio: 2 * c,
        }),
        c @ 51..=100 => Ok(BlockPolicy::Composite {
            light: Arc::new(Lz4Codec),
            heavy: Arc::new(ZstdCodec::new(ZSTD_MIX_LEVEL)),
            ratio: 2 * (c - 50),
        }),
        c => Err(Error::BadCompression(c)),
    }
}
