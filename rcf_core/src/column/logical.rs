//! Tri-state logical columns, packed four values per byte.
//!
//! Bit patterns per value: `00` false, `01` true, `10` missing. The packed
//! bytes go through the streamer as a byte stream, so a row range maps to a
//! packed byte range and only the covering bytes are decoded.

use std::io::{Read, Seek, Write};

use crate::column::policy_for;
use crate::error::Result;
use crate::format::{BLOCK_SIZE_LOGICAL, READ_BATCH_BLOCKS};
use crate::streamer::{read_stream, write_stream, StreamInfo};

fn pack(values: &[Option<bool>]) -> Vec<u8> {
    let mut packed = vec![0u8; values.len().div_ceil(4)];
    for (i, v) in values.iter().enumerate() {
        let bits: u8 = match v {
            Some(false) => 0b00,
            Some(true) => 0b01,
            None => 0b10,
        };
        packed[i / 4] |= bits << (2 * (i % 4));
    }
    packed
}

fn unpack_one(byte: u8, slot: u64) -> Option<bool> {
    match (byte >> (2 * slot)) & 0b11 {
        0b00 => Some(false),
        0b01 => Some(true),
        _ => None,
    }
}

pub(crate) fn write_logical<W: Write + Seek>(
    w: &mut W,
    values: &[Option<bool>],
    compression: u8,
    annotation: &str,
) -> Result<()> {
    let packed = pack(values);
    let policy = policy_for(compression)?;
    write_stream(
        w,
        &packed,
        packed.len() as u64,
        1,
        BLOCK_SIZE_LOGICAL,
        &policy,
        annotation,
    )
}

pub(crate) fn read_logical<R: Read + Seek>(
    r: &mut R,
    out: &mut [Option<bool>],
    block_pos: u64,
    start_row: u64,
    total_rows: u64,
) -> Result<StreamInfo> {
    let total_packed = total_rows.div_ceil(4);
    if out.is_empty() {
        return read_stream(r, &mut [], block_pos, 0, 0, total_packed, 1, READ_BATCH_BLOCKS);
    }

    let len = out.len() as u64;
    let first_byte = start_row / 4;
    let last_byte = (start_row + len - 1) / 4;
    let mut buf = vec![0u8; (last_byte - first_byte + 1) as usize];
    let info = read_stream(
        r,
        &mut buf,
        block_pos,
        first_byte,
        last_byte - first_byte + 1,
        total_packed,
        1,
        READ_BATCH_BLOCKS,
    )?;

    for (i, v) in out.iter_mut().enumerate() {
        let row = start_row + i as u64;
        *v = unpack_one(buf[(row / 4 - first_byte) as usize], row % 4);
    }
    Ok(info)
}
