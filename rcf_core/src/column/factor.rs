//! Factor column serializer: level strings plus 1-based level codes.
//!
//! Layout:
//!
//! ```text
//! prelude: u32 n_levels | u32 free | u64 levels_len
//! levels:  a full character column (n_levels strings)
//! codes:   an INT_32 stream (0 = missing), row-selectable
//! ```
//!
//! `levels_len` is the byte length of the level block, patched after it is
//! written, so the read path can seek straight to the codes without parsing
//! the level streams when it only needs their location.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::column::numeric::{read_int32, write_int32};
use crate::column::string::{read_character, write_character};
use crate::error::Result;
use crate::format::{get_u32, get_u64, put_u32, put_u64};
use crate::types::StringEncoding;

pub(crate) const FACTOR_PRELUDE_SIZE: usize = 16;

pub(crate) fn write_factor<W: Write + Seek>(
    w: &mut W,
    codes: &[i32],
    levels: &[String],
    encoding: StringEncoding,
    compression: u8,
    annotation: &str,
) -> Result<()> {
    let prelude_pos = w.stream_position()?;
    let mut prelude = [0u8; FACTOR_PRELUDE_SIZE];
    put_u32(&mut prelude, 0, levels.len() as u32);
    w.write_all(&prelude)?; // levels_len patched below

    write_character(w, levels, encoding, compression)?;
    let levels_end = w.stream_position()?;
    let levels_len = levels_end - (prelude_pos + FACTOR_PRELUDE_SIZE as u64);

    write_int32(w, codes, compression, annotation)?;
    let end_pos = w.stream_position()?;

    put_u64(&mut prelude, 8, levels_len);
    w.seek(SeekFrom::Start(prelude_pos))?;
    w.write_all(&prelude)?;
    w.seek(SeekFrom::Start(end_pos))?;
    Ok(())
}

/// Levels and stream metadata of a factor column; codes are filled into the
/// caller's buffer.
pub(crate) struct FactorSlice {
    pub levels: Vec<String>,
    pub encoding: StringEncoding,
    pub annotation: String,
}

pub(crate) fn read_factor<R: Read + Seek>(
    r: &mut R,
    codes_out: &mut [i32],
    block_pos: u64,
    start_row: u64,
    total_rows: u64,
) -> Result<FactorSlice> {
    r.seek(SeekFrom::Start(block_pos))?;
    let mut prelude = [0u8; FACTOR_PRELUDE_SIZE];
    r.read_exact(&mut prelude)?;
    let n_levels = get_u32(&prelude, 0) as u64;
    let levels_len = get_u64(&prelude, 8);

    let levels_pos = block_pos + FACTOR_PRELUDE_SIZE as u64;
    let levels = read_character(r, levels_pos, 0, n_levels, n_levels)?;

    let codes_pos = levels_pos + levels_len;
    let info = read_int32(r, codes_out, codes_pos, start_row, total_rows)?;

    Ok(FactorSlice {
        levels: levels.values,
        encoding: levels.encoding,
        annotation: info.annotation,
    })
}
