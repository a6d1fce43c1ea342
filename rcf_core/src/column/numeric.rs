//! Fixed-width numeric and byte column serializers.
//!
//! Elements are written as little-endian values regardless of host; the
//! double path goes through the raw bit pattern, so every NaN payload
//! (including the missing-value sentinel) survives a round trip exactly.

use std::io::{Read, Seek, Write};

use crate::column::policy_for;
use crate::error::Result;
use crate::format::{
    BLOCK_SIZE_BYTE, BLOCK_SIZE_DOUBLE, BLOCK_SIZE_INT32, BLOCK_SIZE_INT64, READ_BATCH_BLOCKS,
};
use crate::streamer::{read_stream, write_stream, StreamInfo};

pub(crate) fn write_int32<W: Write + Seek>(
    w: &mut W,
    values: &[i32],
    compression: u8,
    annotation: &str,
) -> Result<()> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let policy = policy_for(compression)?;
    write_stream(
        w,
        &bytes,
        values.len() as u64,
        4,
        BLOCK_SIZE_INT32,
        &policy,
        annotation,
    )
}

pub(crate) fn read_int32<R: Read + Seek>(
    r: &mut R,
    out: &mut [i32],
    block_pos: u64,
    start_row: u64,
    total_rows: u64,
) -> Result<StreamInfo> {
    let mut buf = vec![0u8; out.len() * 4];
    let info = read_stream(
        r,
        &mut buf,
        block_pos,
        start_row,
        out.len() as u64,
        total_rows,
        4,
        READ_BATCH_BLOCKS,
    )?;
    for (v, chunk) in out.iter_mut().zip(buf.chunks_exact(4)) {
        *v = i32::from_le_bytes(chunk.try_into().unwrap());
    }
    Ok(info)
}

pub(crate) fn write_double<W: Write + Seek>(
    w: &mut W,
    values: &[f64],
    compression: u8,
    annotation: &str,
) -> Result<()> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let policy = policy_for(compression)?;
    write_stream(
        w,
        &bytes,
        values.len() as u64,
        8,
        BLOCK_SIZE_DOUBLE,
        &policy,
        annotation,
    )
}

pub(crate) fn read_double<R: Read + Seek>(
    r: &mut R,
    out: &mut [f64],
    block_pos: u64,
    start_row: u64,
    total_rows: u64,
) -> Result<StreamInfo> {
    let mut buf = vec![0u8; out.len() * 8];
    let info = read_stream(
        r,
        &mut buf,
        block_pos,
        start_row,
        out.len() as u64,
        total_rows,
        8,
        READ_BATCH_BLOCKS,
    )?;
    for (v, chunk) in out.iter_mut().zip(buf.chunks_exact(8)) {
        *v = f64::from_le_bytes(chunk.try_into().unwrap());
    }
    Ok(info)
}

pub(crate) fn write_int64<W: Write + Seek>(
    w: &mut W,
    values: &[i64],
    compression: u8,
    annotation: &str,
) -> Result<()> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let policy = policy_for(compression)?;
    write_stream(
        w,
        &bytes,
        values.len() as u64,
        8,
        BLOCK_SIZE_INT64,
        &policy,
        annotation,
    )
}

pub(crate) fn read_int64<R: Read + Seek>(
    r: &mut R,
    out: &mut [i64],
    block_pos: u64,
    start_row: u64,
    total_rows: u64,
) -> Result<StreamInfo> {
    let mut buf = vec![0u8; out.len() * 8];
    let info = read_stream(
        r,
        &mut buf,
        block_pos,
        start_row,
        out.len() as u64,
        total_rows,
        8,
        READ_BATCH_BLOCKS,
    )?;
    for (v, chunk) in out.iter_mut().zip(buf.chunks_exact(8)) {
        *v = i64::from_le_bytes(chunk.try_into().unwrap());
    }
    Ok(info)
}

pub(crate) fn write_byte<W: Write + Seek>(
    w: &mut W,
    values: &[u8],
    compression: u8,
    annotation: &str,
) -> Result<()> {
    let policy = policy_for(compression)?;
    write_stream(
        w,
        values,
        values.len() as u64,
        1,
        BLOCK_SIZE_BYTE,
        &policy,
        annotation,
    )
}

pub(crate) fn read_byte<R: Read + Seek>(
    r: &mut R,
    out: &mut [u8],
    block_pos: u64,
    start_row: u64,
    total_rows: u64,
) -> Result<StreamInfo> {
    let len = out.len() as u64;
    read_stream(
        r,
        out,
        block_pos,
        start_row,
        len,
        total_rows,
        1,
        READ_BATCH_BLOCKS,
    )
}
