//! Character column serializer.
//!
//! A character column is a 16-byte prelude followed by two block streams:
//!
//! ```text
//! prelude: u32 flags (encoding in low 8 bits) | u32 free | u64 bulk_len
//! offsets stream: cumulative end offset (u32) per row, element size 4
//! bulk stream:    concatenated string bytes, element size 1
//! ```
//!
//! Random access to rows `[a, b)` reads offsets `[a-1, b)` (the leading
//! entry gives the byte position where row `a` starts; row 0 starts at 0)
//! and then exactly the byte range those offsets delimit. `bulk_len` in the
//! prelude sizes the bulk stream's block index without touching the offsets
//! first.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::column::policy_for;
use crate::error::{Error, Result};
use crate::format::{
    get_u32, get_u64, put_u32, put_u64, BLOCK_SIZE_CHAR, BLOCK_SIZE_OFFSETS, READ_BATCH_BLOCKS,
};
use crate::streamer::{read_stream, write_stream};
use crate::types::StringEncoding;

pub(crate) const CHARACTER_PRELUDE_SIZE: usize = 16;

pub(crate) fn write_character<W: Write + Seek>(
    w: &mut W,
    values: &[String],
    encoding: StringEncoding,
    compression: u8,
) -> Result<()> {
    let mut offsets = Vec::with_capacity(values.len() * 4);
    let mut total: u64 = 0;
    for v in values {
        total += v.len() as u64;
        if total > u32::MAX as u64 {
            return Err(Error::InvalidData(
                "character column bulk data exceeds 4 GiB".into(),
            ));
        }
        offsets.extend_from_slice(&(total as u32).to_le_bytes());
    }

    let mut prelude = [0u8; CHARACTER_PRELUDE_SIZE];
    put_u32(&mut prelude, 0, encoding as u32);
    put_u64(&mut prelude, 8, total);
    w.write_all(&prelude)?;

    let policy = policy_for(compression)?;
    write_stream(
        w,
        &offsets,
        values.len() as u64,
        4,
        BLOCK_SIZE_OFFSETS,
        &policy,
        "",
    )?;

    let mut bulk = Vec::with_capacity(total as usize);
    for v in values {
        bulk.extend_from_slice(v.as_bytes());
    }
    write_stream(w, &bulk, total, 1, BLOCK_SIZE_CHAR, &policy, "")
}

/// Decoded slice of a character column.
pub(crate) struct CharacterSlice {
    pub values: Vec<String>,
    pub encoding: StringEncoding,
    /// File offset just past the whole column (prelude + both streams).
    pub end_pos: u64,
}

pub(crate) fn read_character<R: Read + Seek>(
    r: &mut R,
    block_pos: u64,
    start_row: u64,
    len: u64,
    total_rows: u64,
) -> Result<CharacterSlice> {
    r.seek(SeekFrom::Start(block_pos))?;
    let mut prelude = [0u8; CHARACTER_PRELUDE_SIZE];
    r.read_exact(&mut prelude)?;
    let encoding = StringEncoding::try_from((get_u32(&prelude, 0) & 0xFF) as u8)?;
    let bulk_len = get_u64(&prelude, 8);

    let offsets_pos = block_pos + CHARACTER_PRELUDE_SIZE as u64;

    if len == 0 {
        // Parse both stream skeletons so the column's end is still known.
        let off_info = read_stream(r, &mut [], offsets_pos, 0, 0, total_rows, 4, READ_BATCH_BLOCKS)?;
        let bulk_info =
            read_stream(r, &mut [], off_info.end_pos, 0, 0, bulk_len, 1, READ_BATCH_BLOCKS)?;
        return Ok(CharacterSlice {
            values: Vec::new(),
            encoding,
            end_pos: bulk_info.end_pos,
        });
    }

    // One leading offset gives the start byte of the first requested row.
    let lead = u64::from(start_row > 0);
    let n_off = len + lead;
    let mut off_buf = vec![0u8; (n_off * 4) as usize];
    let off_info = read_stream(
        r,
        &mut off_buf,
        offsets_pos,
        start_row - lead,
        n_off,
        total_rows,
        4,
        READ_BATCH_BLOCKS,
    )?;
    let offsets: Vec<u64> = off_buf
        .chunks_exact(4)
        .map(|c| get_u32(c, 0) as u64)
        .collect();

    let start_byte = if lead == 1 { offsets[0] } else { 0 };
    let end_byte = offsets[offsets.len() - 1];
    if end_byte < start_byte || end_byte > bulk_len {
        return Err(Error::InvalidData("string offsets are not monotonic".into()));
    }

    let mut bulk = vec![0u8; (end_byte - start_byte) as usize];
    let bulk_info = read_stream(
        r,
        &mut bulk,
        off_info.end_pos,
        start_byte,
        end_byte - start_byte,
        bulk_len,
        1,
        READ_BATCH_BLOCKS,
    )?;

    let mut values = Vec::with_capacity(len as usize);
    let mut prev = start_byte;
    for i in 0..len as usize {
        let end = offsets[lead as usize + i];
        if end < prev || end > bulk_len {
            return Err(Error::InvalidData("string offsets are not monotonic".into()));
        }
        let bytes = &bulk[(prev - start_byte) as usize..(end - start_byte) as usize];
        let s = std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidData("string bytes are not valid UTF-8".into()))?;
        values.push(s.to_owned());
        prev = end;
    }

    Ok(CharacterSlice {
        values,
        encoding,
        end_pos: bulk_info.end_pos,
    })
}
