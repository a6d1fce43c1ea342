//! On-disk layout of the RCF header tree.
//!
//! An RCF file is a tree of hashed header nodes in front of per-column block
//! streams:
//!
//! ```text
//! [A: table header, 44 B]
//! [B: key index, 8 + 4·K B — only when K > 0]
//! [C: chunkset header, 76 + 8·C B]
//! [column-names header, 24 B]
//! [column-names payload: a character column stream]
//! [D: chunk index, 96 B]
//! [E: data-chunk header, 24 + 8·C B]
//! [column 0 stream] [column 1 stream] ... [column C-1 stream]
//! ```
//!
//! Every node stores, in its first 8 bytes, the seeded XXH64 of the node body
//! (the bytes immediately after the hash slot to the end of the node). All
//! integers are little-endian regardless of host.
//!
//! Encoding and decoding go through explicit byte offsets into plain byte
//! buffers; field positions are documented next to each size constant and
//! are frozen — only the free slots may be given meaning in later versions.

use xxhash_rust::xxh64::xxh64;

use crate::error::{Error, Result};

/// Version written to every node; bump only on layout change.
pub const FORMAT_VERSION: u32 = 1;

/// Seed for every node hash in the file.
pub const HASH_SEED: u64 = 912_824_571;

// ── Node sizes ─────────────────────────────────────────────────────────────

/// Table header (node A):
///   hash:u64 | version:u32 | flags:i32 | free:8 | versionMax:u32
///   | nrOfCols:i32 | primaryChunkSetLoc:u64 | keyLength:i32
pub const TABLE_HEADER_SIZE: usize = 44;

/// Key index (node B, present iff K > 0): hash:u64 | keyColPos:i32 × K
pub fn key_index_size(key_length: usize) -> usize {
    if key_length == 0 {
        0
    } else {
        8 + 4 * key_length
    }
}

/// Chunkset header (node C), fixed part:
///   hash:u64 | version:u32 | flags:i32 | free:16 | colNamesPos:u64
///   | nextHorzChunkSet:u64 | primChunksetIndex:u64 | secChunksetIndex:u64
///   | nrOfRows:u64 | nrOfChunksetCols:i32
/// followed by four u16 arrays of length C (attributes, stream types,
/// base types, scales).
pub const CHUNKSET_HEADER_SIZE: usize = 76;

pub fn chunkset_header_size(n_cols: usize) -> usize {
    CHUNKSET_HEADER_SIZE + 8 * n_cols
}

/// Column-names header: hash:u64 | version:u32 | flags:i32 | free:8.
/// The names themselves follow as an ordinary character column stream and
/// are not covered by this node's hash.
pub const COL_NAMES_HEADER_SIZE: usize = 24;

/// Chunk index (node D):
///   hash:u64 | version:u32 | flags:i32 | free:8 | nrOfChunkSlots:u16
///   | free:6 | chunkPos:u64 × 4 | chunkRows:u64 × 4
pub const CHUNK_INDEX_SIZE: usize = 96;

/// Reserved chunk slots in node D. Writers populate slot 0 only; the other
/// slots are format extension space.
pub const CHUNK_SLOTS: usize = 4;

/// Data-chunk header (node E), fixed part:
///   hash:u64 | version:u32 | flags:i32 | free:8
/// followed by positionData:u64 × C.
pub const DATA_CHUNK_HEADER_SIZE: usize = 24;

pub fn data_chunk_header_size(n_cols: usize) -> usize {
    DATA_CHUNK_HEADER_SIZE + 8 * n_cols
}

// ── Column stream dispatch tags ────────────────────────────────────────────
//
// Stored per column in the chunkset header's stream-type array; each value
// names the serializer that produced the column stream.

pub const STREAM_CHARACTER: u16 = 6;
pub const STREAM_FACTOR: u16 = 7;
pub const STREAM_INT32: u16 = 8;
pub const STREAM_DOUBLE: u16 = 9;
pub const STREAM_LOGICAL: u16 = 10;
pub const STREAM_INT64: u16 = 11;
pub const STREAM_BYTE: u16 = 12;

// ── Block sizes ────────────────────────────────────────────────────────────
//
// Elements per compression block, per column type; all ≈16 KiB of raw input
// so one block is one cheap random-access unit.

pub const BLOCK_SIZE_DOUBLE: usize = 2048;
pub const BLOCK_SIZE_INT32: usize = 4096;
pub const BLOCK_SIZE_INT64: usize = 2048;
pub const BLOCK_SIZE_BYTE: usize = 16384;
/// Packed logical bytes (4 tri-state values per byte).
pub const BLOCK_SIZE_LOGICAL: usize = 16384;
/// Cumulative string end offsets (u32 per row).
pub const BLOCK_SIZE_OFFSETS: usize = 4096;
/// String bulk bytes.
pub const BLOCK_SIZE_CHAR: usize = 16384;

/// I/O hint: maximum blocks fetched per read call on the read path
/// (≈400 KiB per batch at the block sizes above).
pub const READ_BATCH_BLOCKS: usize = 25;

// ── Little-endian field helpers ────────────────────────────────────────────

pub(crate) fn put_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

pub(crate) fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}

pub(crate) fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

pub(crate) fn get_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

pub(crate) fn get_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

/// Hash of a node body (everything after the 8-byte hash slot).
pub(crate) fn node_hash(body: &[u8]) -> u64 {
    xxh64(body, HASH_SEED)
}

/// Stamp `buf[node_off..node_off+8]` with the hash of
/// `buf[node_off+8..node_off+node_size]`.
pub(crate) fn stamp_node_hash(buf: &mut [u8], node_off: usize, node_size: usize) {
    let h = node_hash(&buf[node_off + 8..node_off + node_size]);
    put_u64(buf, node_off, h);
}

/// Check a node hash without consuming the buffer.
pub(crate) fn node_hash_ok(buf: &[u8], node_off: usize, node_size: usize) -> bool {
    get_u64(buf, node_off) == node_hash(&buf[node_off + 8..node_off + node_size])
}

// ── Node A: table header ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TableHeader {
    pub version: u32,
    pub flags: i32,
    pub version_max: u32,
    pub n_cols: usize,
    pub primary_chunkset_loc: u64,
    pub key_length: usize,
}

impl TableHeader {
    /// Encode into `buf[0..TABLE_HEADER_SIZE]`, including the node hash.
    pub fn write_to(&self, buf: &mut [u8]) {
        put_u32(buf, 8, self.version);
        put_i32(buf, 12, self.flags);
        // free bytes at 16..24 stay zero
        put_u32(buf, 24, self.version_max);
        put_i32(buf, 28, self.n_cols as i32);
        put_u64(buf, 32, self.primary_chunkset_loc);
        put_i32(buf, 40, self.key_length as i32);
        stamp_node_hash(buf, 0, TABLE_HEADER_SIZE);
    }

    /// Decode from `buf[0..TABLE_HEADER_SIZE]`, verifying the node hash.
    ///
    /// A hash mismatch here means the file is not RCF at all.
    pub fn read_from(buf: &[u8]) -> Result<Self> {
        if !node_hash_ok(buf, 0, TABLE_HEADER_SIZE) {
            return Err(Error::NotRcfFile);
        }
        let n_cols = get_i32(buf, 28);
        let key_length = get_i32(buf, 40);
        if n_cols <= 0 || key_length < 0 || key_length > n_cols {
            return Err(Error::InvalidData(format!(
                "table header: {n_cols} columns, {key_length} keys"
            )));
        }
        Ok(Self {
            version: get_u32(buf, 8),
            flags: get_i32(buf, 12),
            version_max: get_u32(buf, 24),
            n_cols: n_cols as usize,
            primary_chunkset_loc: get_u64(buf, 32),
            key_length: key_length as usize,
        })
    }
}

// ── Node B: key index ──────────────────────────────────────────────────────

/// Encode the key index into `buf[0..key_index_size(K)]` (no-op when K = 0).
pub fn write_key_index(buf: &mut [u8], key_positions: &[usize]) {
    if key_positions.is_empty() {
        return;
    }
    for (i, &pos) in key_positions.iter().enumerate() {
        put_i32(buf, 8 + 4 * i, pos as i32);
    }
    stamp_node_hash(buf, 0, key_index_size(key_positions.len()));
}

/// Decode and verify the key index from `buf[0..key_index_size(K)]`.
pub fn read_key_index(buf: &[u8], key_length: usize) -> Result<Vec<usize>> {
    if key_length == 0 {
        return Ok(Vec::new());
    }
    if !node_hash_ok(buf, 0, key_index_size(key_length)) {
        return Err(Error::DamagedHeader("key index"));
    }
    (0..key_length)
        .map(|i| {
            let pos = get_i32(buf, 8 + 4 * i);
            if pos < 0 {
                Err(Error::InvalidData(format!("negative key position {pos}")))
            } else {
                Ok(pos as usize)
            }
        })
        .collect()
}

// ── Node C: chunkset header ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChunksetHeader {
    pub version: u32,
    pub flags: i32,
    pub col_names_pos: u64,
    pub next_horz_chunkset: u64,
    pub prim_chunkset_index: u64,
    pub sec_chunkset_index: u64,
    pub n_rows: u64,
    pub n_chunkset_cols: usize,
    pub col_attributes: Vec<u16>,
    pub col_stream_types: Vec<u16>,
    pub col_base_types: Vec<u16>,
    pub col_scales: Vec<u16>,
}

impl ChunksetHeader {
    pub fn new(n_cols: usize, n_rows: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            flags: 0,
            col_names_pos: 0,
            next_horz_chunkset: 0,
            prim_chunkset_index: 0,
            sec_chunkset_index: 0,
            n_rows,
            n_chunkset_cols: n_cols,
            col_attributes: vec![0; n_cols],
            col_stream_types: vec![0; n_cols],
            col_base_types: vec![0; n_cols],
            col_scales: vec![0; n_cols],
        }
    }

    /// Encode into `buf[0..chunkset_header_size(C)]`, including the hash.
    pub fn write_to(&self, buf: &mut [u8]) {
        let c = self.n_chunkset_cols;
        put_u32(buf, 8, self.version);
        put_i32(buf, 12, self.flags);
        // free bytes at 16..32 stay zero
        put_u64(buf, 32, self.col_names_pos);
        put_u64(buf, 40, self.next_horz_chunkset);
        put_u64(buf, 48, self.prim_chunkset_index);
        put_u64(buf, 56, self.sec_chunkset_index);
        put_u64(buf, 64, self.n_rows);
        put_i32(buf, 72, c as i32);
        for i in 0..c {
            put_u16(buf, 76 + 2 * i, self.col_attributes[i]);
            put_u16(buf, 76 + 2 * c + 2 * i, self.col_stream_types[i]);
            put_u16(buf, 76 + 4 * c + 2 * i, self.col_base_types[i]);
            put_u16(buf, 76 + 6 * c + 2 * i, self.col_scales[i]);
        }
        stamp_node_hash(buf, 0, chunkset_header_size(c));
    }

    /// Decode and verify from `buf[0..chunkset_header_size(n_cols)]`.
    pub fn read_from(buf: &[u8], n_cols: usize) -> Result<Self> {
        if !node_hash_ok(buf, 0, chunkset_header_size(n_cols)) {
            return Err(Error::DamagedHeader("chunkset"));
        }
        let c = n_cols;
        Ok(Self {
            version: get_u32(buf, 8),
            flags: get_i32(buf, 12),
            col_names_pos: get_u64(buf, 32),
            next_horz_chunkset: get_u64(buf, 40),
            prim_chunkset_index: get_u64(buf, 48),
            sec_chunkset_index: get_u64(buf, 56),
            n_rows: get_u64(buf, 64),
            n_chunkset_cols: get_i32(buf, 72) as usize,
            col_attributes: (0..c).map(|i| get_u16(buf, 76 + 2 * i)).collect(),
            col_stream_types: (0..c).map(|i| get_u16(buf, 76 + 2 * c + 2 * i)).collect(),
            col_base_types: (0..c).map(|i| get_u16(buf, 76 + 4 * c + 2 * i)).collect(),
            col_scales: (0..c).map(|i| get_u16(buf, 76 + 6 * c + 2 * i)).collect(),
        })
    }
}

// ── Column-names header ────────────────────────────────────────────────────

/// Encode the column-names header into `buf[0..COL_NAMES_HEADER_SIZE]`.
pub fn write_col_names_header(buf: &mut [u8]) {
    put_u32(buf, 8, FORMAT_VERSION);
    put_i32(buf, 12, 0);
    // free bytes at 16..24 stay zero
    stamp_node_hash(buf, 0, COL_NAMES_HEADER_SIZE);
}

/// Verify the column-names header.
pub fn check_col_names_header(buf: &[u8]) -> Result<()> {
    if !node_hash_ok(buf, 0, COL_NAMES_HEADER_SIZE) {
        return Err(Error::DamagedHeader("column names"));
    }
    Ok(())
}

// ── Node D: chunk index ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChunkIndex {
    pub version: u32,
    pub flags: i32,
    pub n_chunk_slots: u16,
    pub chunk_pos: [u64; CHUNK_SLOTS],
    pub chunk_rows: [u64; CHUNK_SLOTS],
}

impl ChunkIndex {
    /// Single-chunk index: only slot 0 populated, all slots reserved.
    pub fn single(n_rows: u64) -> Self {
        let mut chunk_rows = [0u64; CHUNK_SLOTS];
        chunk_rows[0] = n_rows;
        Self {
            version: FORMAT_VERSION,
            flags: 0,
            n_chunk_slots: CHUNK_SLOTS as u16,
            chunk_pos: [0; CHUNK_SLOTS],
            chunk_rows,
        }
    }

    /// Encode into `buf[0..CHUNK_INDEX_SIZE]`, including the hash.
    pub fn write_to(&self, buf: &mut [u8]) {
        put_u32(buf, 8, self.version);
        put_i32(buf, 12, self.flags);
        // free bytes at 16..24 stay zero
        put_u16(buf, 24, self.n_chunk_slots);
        // free bytes at 26..32 stay zero
        for i in 0..CHUNK_SLOTS {
            put_u64(buf, 32 + 8 * i, self.chunk_pos[i]);
            put_u64(buf, 64 + 8 * i, self.chunk_rows[i]);
        }
        stamp_node_hash(buf, 0, CHUNK_INDEX_SIZE);
    }

    /// Decode and verify from `buf[0..CHUNK_INDEX_SIZE]`.
    pub fn read_from(buf: &[u8]) -> Result<Self> {
        if !node_hash_ok(buf, 0, CHUNK_INDEX_SIZE) {
            return Err(Error::DamagedChunkIndex("chunk index"));
        }
        let mut chunk_pos = [0u64; CHUNK_SLOTS];
        let mut chunk_rows = [0u64; CHUNK_SLOTS];
        for i in 0..CHUNK_SLOTS {
            chunk_pos[i] = get_u64(buf, 32 + 8 * i);
            chunk_rows[i] = get_u64(buf, 64 + 8 * i);
        }
        Ok(Self {
            version: get_u32(buf, 8),
            flags: get_i32(buf, 12),
            n_chunk_slots: get_u16(buf, 24),
            chunk_pos,
            chunk_rows,
        })
    }
}

// ── Node E: data-chunk header ──────────────────────────────────────────────

/// Encode the data-chunk header (version, flags, per-column stream
/// positions) into `buf[0..data_chunk_header_size(C)]`, including the hash.
pub fn write_data_chunk_header(buf: &mut [u8], position_data: &[u64]) {
    put_u32(buf, 8, FORMAT_VERSION);
    put_i32(buf, 12, 0);
    // free bytes at 16..24 stay zero
    for (i, &pos) in position_data.iter().enumerate() {
        put_u64(buf, 24 + 8 * i, pos);
    }
    stamp_node_hash(buf, 0, data_chunk_header_size(position_data.len()));
}

/// Decode and verify the data-chunk header, returning the per-column stream
/// positions.
pub fn read_data_chunk_header(buf: &[u8], n_cols: usize) -> Result<Vec<u64>> {
    if !node_hash_ok(buf, 0, data_chunk_header_size(n_cols)) {
        return Err(Error::DamagedChunkIndex("data chunk"));
    }
    Ok((0..n_cols).map(|i| get_u64(buf, 24 + 8 * i)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_header_round_trip() {
        let header = TableHeader {
            version: FORMAT_VERSION,
            flags: 0,
            version_max: FORMAT_VERSION,
            n_cols: 12,
            primary_chunkset_loc: 52 + 4 * 2,
            key_length: 2,
        };
        let mut buf = vec![0u8; TABLE_HEADER_SIZE];
        header.write_to(&mut buf);

        let back = TableHeader::read_from(&buf).unwrap();
        assert_eq!(back.n_cols, 12);
        assert_eq!(back.key_length, 2);
        assert_eq!(back.primary_chunkset_loc, 60);
    }

    #[test]
    fn table_header_detects_corruption() {
        let header = TableHeader {
            version: FORMAT_VERSION,
            flags: 0,
            version_max: FORMAT_VERSION,
            n_cols: 1,
            primary_chunkset_loc: 44,
            key_length: 0,
        };
        let mut buf = vec![0u8; TABLE_HEADER_SIZE];
        header.write_to(&mut buf);
        buf[30] ^= 0x01;
        assert!(matches!(
            TableHeader::read_from(&buf),
            Err(Error::NotRcfFile)
        ));
    }

    #[test]
    fn key_index_round_trip() {
        let keys = vec![3usize, 0, 7];
        let mut buf = vec![0u8; key_index_size(keys.len())];
        write_key_index(&mut buf, &keys);
        assert_eq!(read_key_index(&buf, 3).unwrap(), keys);

        buf[9] ^= 0xFF;
        assert!(matches!(
            read_key_index(&buf, 3),
            Err(Error::DamagedHeader("key index"))
        ));
    }

    #[test]
    fn chunkset_header_round_trip() {
        let c = 5;
        let mut header = ChunksetHeader::new(c, 1000);
        for i in 0..c {
            header.col_attributes[i] = 1;
            header.col_stream_types[i] = (8 + i) as u16;
            header.col_base_types[i] = (2 + i) as u16;
            header.col_scales[i] = i as u16;
        }
        let mut buf = vec![0u8; chunkset_header_size(c)];
        header.write_to(&mut buf);

        let back = ChunksetHeader::read_from(&buf, c).unwrap();
        assert_eq!(back.n_rows, 1000);
        assert_eq!(back.n_chunkset_cols, c);
        assert_eq!(back.col_stream_types, header.col_stream_types);
        assert_eq!(back.col_base_types, header.col_base_types);
        assert_eq!(back.col_scales, header.col_scales);
    }

    #[test]
    fn chunk_index_single_slot() {
        let index = ChunkIndex::single(42);
        let mut buf = vec![0u8; CHUNK_INDEX_SIZE];
        index.write_to(&mut buf);

        let back = ChunkIndex::read_from(&buf).unwrap();
        assert_eq!(back.n_chunk_slots, 4);
        assert_eq!(back.chunk_rows[0], 42);
        assert_eq!(back.chunk_rows[1..], [0, 0, 0]);
    }

    #[test]
    fn data_chunk_header_round_trip() {
        let positions = vec![200u64, 4096, 123_456];
        let mut buf = vec![0u8; data_chunk_header_size(positions.len())];
        write_data_chunk_header(&mut buf, &positions);
        assert_eq!(read_data_chunk_header(&buf, 3).unwrap(), positions);

        buf[25] ^= 0x10;
        assert!(matches!(
            read_data_chunk_header(&buf, 3),
            Err(Error::DamagedChunkIndex("data chunk"))
        ));
    }
}
