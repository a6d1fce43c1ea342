//! Block streamer: drives one column through fixed-size compression blocks.
//!
//! A column stream is laid out as:
//!
//! ```text
//! [stream header: 16 B + annotation]
//!   u32 block_size_elems | u32 elem_size | u16 version | u16 flags
//!   u32 annotation_len   | annotation bytes
//! [block index: 8 B per block]
//!   u32 compressed_size | u16 algo_tag | u16 free
//! [block payloads, concatenated in index order]
//! ```
//!
//! Block payload offsets are implicit: the payload of block `i` starts at
//! the end of the index plus the sum of the compressed sizes of blocks
//! `0..i`. A short final block is zero-padded to the full block size before
//! it is handed to a codec, so every compressed payload decodes to exactly
//! one full block; raw blocks carry their live bytes only. The live range is
//! recovered by slicing against the stream's true element count.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use rcf_codecs::{codec_by_tag, BlockPolicy, Codec, ALGO_RAW};

use crate::error::{Error, Result};
use crate::format::{get_u16, get_u32, put_u16, put_u32};

pub(crate) const STREAM_HEADER_SIZE: usize = 16;
pub(crate) const BLOCK_ENTRY_SIZE: usize = 8;
const STREAM_VERSION: u16 = 1;

/// Facts about a stream learned while reading it.
#[derive(Debug)]
pub(crate) struct StreamInfo {
    pub annotation: String,
    /// File offset just past the end of the stream (header + index + all
    /// payloads), independent of which elements were requested.
    pub end_pos: u64,
}

fn n_blocks_for(n_elems: u64, block_size_elems: usize) -> usize {
    n_elems.div_ceil(block_size_elems as u64) as usize
}

/// Write one column stream at the current file position.
///
/// `data` holds the column's `n_elems` elements already encoded as
/// little-endian bytes (`n_elems * elem_size` bytes). The block index is
/// written as a placeholder first and patched once all payload sizes are
/// known, leaving the cursor at the end of the stream.
pub(crate) fn write_stream<W: Write + Seek>(
    w: &mut W,
    data: &[u8],
    n_elems: u64,
    elem_size: usize,
    block_size_elems: usize,
    policy: &BlockPolicy,
    annotation: &str,
) -> Result<()> {
    debug_assert_eq!(data.len() as u64, n_elems * elem_size as u64);

    let block_bytes = block_size_elems * elem_size;
    let n_blocks = n_blocks_for(n_elems, block_size_elems);

    let ann = annotation.as_bytes();
    let mut header = vec![0u8; STREAM_HEADER_SIZE + ann.len()];
    put_u32(&mut header, 0, block_size_elems as u32);
    put_u32(&mut header, 4, elem_size as u32);
    put_u16(&mut header, 8, STREAM_VERSION);
    put_u16(&mut header, 10, 0);
    put_u32(&mut header, 12, ann.len() as u32);
    header[STREAM_HEADER_SIZE..].copy_from_slice(ann);
    w.write_all(&header)?;

    let index_pos = w.stream_position()?;
    let mut index = vec![0u8; n_blocks * BLOCK_ENTRY_SIZE];
    w.write_all(&index)?; // placeholder, patched below

    let mut padded = vec![0u8; block_bytes];
    for i in 0..n_blocks {
        let start = i * block_bytes;
        let end = (start + block_bytes).min(data.len());
        let live = &data[start..end];
        let (payload, tag) = match policy.codec_for_block(i as u64) {
            // Raw blocks are stored unpadded; the index records the size.
            None => (live.to_vec(), ALGO_RAW),
            Some(codec) => {
                let full: &[u8] = if live.len() == block_bytes {
                    live
                } else {
                    padded.fill(0);
                    padded[..live.len()].copy_from_slice(live);
                    &padded
                };
                (codec.compress_block(full)?, codec.algo_tag())
            }
        };
        w.write_all(&payload)?;
        put_u32(&mut index, i * BLOCK_ENTRY_SIZE, payload.len() as u32);
        put_u16(&mut index, i * BLOCK_ENTRY_SIZE + 4, tag);
    }

    let end_pos = w.stream_position()?;
    w.seek(SeekFrom::Start(index_pos))?;
    w.write_all(&index)?;
    w.seek(SeekFrom::Start(end_pos))?;
    Ok(())
}

/// Small cache so a run of equally tagged blocks resolves its codec once.
struct TagCache {
    last: Option<(u16, Arc<dyn Codec>)>,
}

impl TagCache {
    fn new() -> Self {
        Self { last: None }
    }

    fn resolve(&mut self, tag: u16) -> Result<Arc<dyn Codec>> {
        if let Some((t, codec)) = &self.last {
            if *t == tag {
                return Ok(codec.clone());
            }
        }
        let codec = codec_by_tag(tag)?;
        self.last = Some((tag, codec.clone()));
        Ok(codec)
    }
}

/// Read elements `[start_elem, start_elem + len_elems)` of the stream at
/// `block_pos` into `out`.
///
/// Only the blocks covering the range are decoded; payload bytes are fetched
/// in runs of at most `batch_blocks` blocks per read call. A zero-length
/// request decodes nothing but still parses the header and index so the
/// stream's end position can be reported.
pub(crate) fn read_stream<R: Read + Seek>(
    r: &mut R,
    out: &mut [u8],
    block_pos: u64,
    start_elem: u64,
    len_elems: u64,
    total_elems: u64,
    elem_size: usize,
    batch_blocks: usize,
) -> Result<StreamInfo> {
    r.seek(SeekFrom::Start(block_pos))?;
    let mut fixed = [0u8; STREAM_HEADER_SIZE];
    r.read_exact(&mut fixed)?;

    let block_size_elems = get_u32(&fixed, 0) as usize;
    let stored_elem_size = get_u32(&fixed, 4) as usize;
    if stored_elem_size != elem_size || block_size_elems == 0 {
        return Err(Error::InvalidData(format!(
            "column stream header: element size {stored_elem_size}, block size {block_size_elems}"
        )));
    }
    let ann_len = get_u32(&fixed, 12) as usize;
    let mut ann_bytes = vec![0u8; ann_len];
    r.read_exact(&mut ann_bytes)?;
    let annotation = String::from_utf8(ann_bytes)
        .map_err(|_| Error::InvalidData("annotation is not valid UTF-8".into()))?;

    let block_bytes = block_size_elems * elem_size;
    let n_blocks = n_blocks_for(total_elems, block_size_elems);
    let mut index = vec![0u8; n_blocks * BLOCK_ENTRY_SIZE];
    r.read_exact(&mut index)?;

    // A compressed block can never legitimately exceed the raw block plus
    // codec framing, which bounds allocations on corrupted indexes.
    let max_payload = block_bytes + block_bytes / 8 + 64;
    let mut sizes = Vec::with_capacity(n_blocks);
    let mut total_payload = 0u64;
    for i in 0..n_blocks {
        let size = get_u32(&index, i * BLOCK_ENTRY_SIZE) as usize;
        if size > max_payload {
            return Err(Error::InvalidData(format!(
                "block {i} payload of {size} bytes exceeds the block size bound"
            )));
        }
        sizes.push(size);
        total_payload += size as u64;
    }

    let payload_start = block_pos + (STREAM_HEADER_SIZE + ann_len) as u64
        + (n_blocks * BLOCK_ENTRY_SIZE) as u64;
    let info = StreamInfo {
        annotation,
        end_pos: payload_start + total_payload,
    };

    if len_elems == 0 {
        return Ok(info);
    }
    debug_assert_eq!(out.len() as u64, len_elems * elem_size as u64);
    if start_elem + len_elems > total_elems {
        return Err(Error::BadRange("out of range"));
    }

    let first_block = (start_elem / block_size_elems as u64) as usize;
    let last_block = ((start_elem + len_elems - 1) / block_size_elems as u64) as usize;

    let mut cache = TagCache::new();
    let mut batch_buf = Vec::new();
    let mut block = first_block;
    let mut batch_offset: u64 = sizes[..first_block].iter().map(|&s| s as u64).sum();
    while block <= last_block {
        let batch_end = (block + batch_blocks - 1).min(last_block);
        let batch_bytes: usize = sizes[block..=batch_end].iter().sum();

        r.seek(SeekFrom::Start(payload_start + batch_offset))?;
        batch_offset += batch_bytes as u64;
        batch_buf.resize(batch_bytes, 0);
        r.read_exact(&mut batch_buf)?;

        let mut payload_off = 0usize;
        for b in block..=batch_end {
            let payload = &batch_buf[payload_off..payload_off + sizes[b]];
            payload_off += sizes[b];

            let block_first = b as u64 * block_size_elems as u64;
            let live_end = total_elems.min(block_first + block_size_elems as u64);
            let live_bytes = ((live_end - block_first) as usize) * elem_size;

            let tag = get_u16(&index, b * BLOCK_ENTRY_SIZE + 4);
            let decoded;
            let raw: &[u8] = if tag == ALGO_RAW {
                if payload.len() != live_bytes {
                    return Err(Error::InvalidData(format!(
                        "raw block {b} holds {} bytes, expected {live_bytes}",
                        payload.len()
                    )));
                }
                payload
            } else {
                decoded = cache.resolve(tag)?.decompress_block(payload, block_bytes)?;
                &decoded
            };

            // Live range of this block, clipped to the request and to the
            // column's true element count (a codec tail block is padded).
            let copy_from = start_elem.max(block_first);
            let copy_to = (start_elem + len_elems).min(live_end);
            let src_start = ((copy_from - block_first) as usize) * elem_size;
            let src_end = ((copy_to - block_first) as usize) * elem_size;
            let dst_start = ((copy_from - start_elem) as usize) * elem_size;
            out[dst_start..dst_start + (src_end - src_start)]
                .copy_from_slice(&raw[src_start..src_end]);
        }
        block = batch_end + 1;
    }

    Ok(info)
}
