use std::io;

use rcf_codecs::CodecError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for all RCF operations.
///
/// Every failure aborts the current operation; no partial result is ever
/// returned, and a hash mismatch is never recovered from — the file is
/// considered untrustworthy.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open file for reading")]
    OpenRead(#[source] io::Error),

    #[error("could not open file for writing")]
    OpenWrite(#[source] io::Error),

    /// Table-header hash mismatch: whatever this file is, it is not RCF.
    #[error("not an RCF file")]
    NotRcfFile,

    /// Hash mismatch on the key index, chunkset header, or column-names
    /// header.
    #[error("damaged header: {0} hash mismatch")]
    DamagedHeader(&'static str),

    /// Hash mismatch on the chunk index or data-chunk header.
    #[error("damaged chunk index: {0} hash mismatch")]
    DamagedChunkIndex(&'static str),

    #[error("file requires format version {required}, this reader supports up to {supported}")]
    UnsupportedVersion { required: u32, supported: u32 },

    #[error("dataset needs at least one row")]
    NoData,

    #[error("dataset needs at least one column")]
    NoColumns,

    #[error("selected column not found: {0}")]
    ColumnNotFound(String),

    #[error("bad row range: {0}")]
    BadRange(&'static str),

    #[error("unknown column type code {0}")]
    UnknownColumnType(u16),

    #[error("compression must be in 0..=100, got {0}")]
    BadCompression(u8),

    #[error("row count {0} exceeds the supported maximum")]
    TooManyRows(u64),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The final flush failed; the file on disk may be corrupt.
    #[error("write failed, file may be corrupt; check disk space and access rights")]
    WriteError(#[source] io::Error),

    /// Payload-level inconsistency: bytes decoded fine but do not form a
    /// valid column (bad UTF-8, element-size mismatch, oversized column).
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
