use std::sync::Arc;

use crate::{Codec, CodecError};

/// Decide, per block, which codec compresses it.
///
/// The choice is a pure function of the block index — never of the block's
/// content — so a reader can locate and decode any block without replaying
/// the writer's decisions, and two writes of the same data are bit-identical.
///
/// Ratios are percentages in `[0, 100]` of blocks that receive the
/// "more compressed" treatment:
/// - `Linear`: `ratio`% of blocks go through `codec`, the rest are stored raw.
/// - `Composite`: `ratio`% of blocks go through `heavy`, the rest through
///   `light`.
pub enum BlockPolicy {
    /// Every block stored raw.
    Uncompressed,
    /// Every block through one codec.
    Single(Arc<dyn Codec>),
    /// Interleave raw blocks and `codec` blocks at `ratio`% compressed.
    Linear { codec: Arc<dyn Codec>, ratio: u8 },
    /// Interleave `light` and `heavy` blocks at `ratio`% heavy.
    Composite {
        light: Arc<dyn Codec>,
        heavy: Arc<dyn Codec>,
        ratio: u8,
    },
}

/// Evenly spread hit pattern: true for exactly `floor(n * ratio / 100)` of
/// the first `n` indices, with hits interleaved rather than front-loaded.
fn spread_hit(block_index: u64, ratio: u8) -> bool {
    let r = ratio.min(100) as u64;
    (block_index + 1) * r / 100 > block_index * r / 100
}

impl BlockPolicy {
    /// The codec for block `block_index`, or `None` when the block is stored
    /// raw.
    pub fn codec_for_block(&self, block_index: u64) -> Option<&dyn Codec> {
        match self {
            BlockPolicy::Uncompressed => None,
            BlockPolicy::Single(codec) => Some(codec.as_ref()),
            BlockPolicy::Linear { codec, ratio } => {
                spread_hit(block_index, *ratio).then(|| codec.as_ref())
            }
            BlockPolicy::Composite {
                light,
                heavy,
                ratio,
            } => {
                if spread_hit(block_index, *ratio) {
                    Some(heavy.as_ref())
                } else {
                    Some(light.as_ref())
                }
            }
        }
    }

    /// Compress one block, returning the payload bytes and the algorithm tag
    /// to record in the block index.
    pub fn compress_block(&self, block_index: u64, raw: &[u8]) -> Result<(Vec<u8>, u16), CodecError> {
        match self.codec_for_block(block_index) {
            None => Ok((raw.to_vec(), crate::ALGO_RAW)),
            Some(codec) => Ok((codec.compress_block(raw)?, codec.algo_tag())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Lz4Codec, ZstdCodec, ALGO_LZ4, ALGO_RAW, ALGO_ZSTD};

    fn hit_count(ratio: u8, n: u64) -> u64 {
        (0..n).filter(|&i| spread_hit(i, ratio)).count() as u64
    }

    #[test]
    fn spread_hits_exact_share() {
        for ratio in [0u8, 1, 10, 37, 50, 80, 99, 100] {
            let n = 1000u64;
            assert_eq!(
                hit_count(ratio, n),
                n * ratio as u64 / 100,
                "ratio {ratio} over {n} blocks"
            );
        }
    }

    #[test]
    fn spread_hits_interleave() {
        // at 50% no two consecutive blocks may both miss or both hit
        let hits: Vec<bool> = (0..100).map(|i| spread_hit(i, 50)).collect();
        for pair in hits.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn linear_policy_tags() {
        let policy = BlockPolicy::Linear {
            codec: Arc::new(Lz4Codec),
            ratio: 40,
        };
        let data = vec![7u8; 256];
        let mut lz4 = 0;
        for i in 0..100 {
            let (_, tag) = policy.compress_block(i, &data).unwrap();
            match tag {
                ALGO_RAW => {}
                ALGO_LZ4 => lz4 += 1,
                other => panic!("unexpected tag {other}"),
            }
        }
        assert_eq!(lz4, 40);
    }

    #[test]
    fn composite_policy_tags() {
        let policy = BlockPolicy::Composite {
            light: Arc::new(Lz4Codec),
            heavy: Arc::new(ZstdCodec::new(20)),
            ratio: 30,
        };
        let data = vec![3u8; 256];
        let mut heavy = 0;
        for i in 0..100 {
            let (_, tag) = policy.compress_block(i, &data).unwrap();
            match tag {
                ALGO_LZ4 => {}
                ALGO_ZSTD => heavy += 1,
                other => panic!("unexpected tag {other}"),
            }
        }
        assert_eq!(heavy, 30);
    }

    #[test]
    fn codecs_round_trip_block() {
        let raw: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let codecs: Vec<Arc<dyn Codec>> = vec![
            Arc::new(Lz4Codec),
            Arc::new(ZstdCodec::default()),
            Arc::new(crate::RawCodec),
        ];
        for codec in codecs {
            let compressed = codec.compress_block(&raw).unwrap();
            let back = codec.decompress_block(&compressed, raw.len()).unwrap();
            assert_eq!(back, raw);
        }
    }
}
