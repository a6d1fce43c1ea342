//! Write, meta, and read engines around a single RCF file path.
//!
//! Every operation is self-contained: it opens the file, runs to completion
//! on the calling thread with blocking I/O, and releases the handle before
//! returning. A `Store` holds nothing but the path, so distinct files can be
//! driven from distinct threads; one file is not meant for concurrent use.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::column::{
    read_byte, read_character, read_double, read_factor, read_int32, read_int64, read_logical,
    write_byte, write_character, write_double, write_factor, write_int32, write_int64,
    write_logical,
};
use crate::error::{Error, Result};
use crate::format::{
    chunkset_header_size, check_col_names_header, data_chunk_header_size, key_index_size,
    read_data_chunk_header, read_key_index, write_col_names_header, write_data_chunk_header,
    write_key_index, ChunkIndex, ChunksetHeader, TableHeader, CHUNK_INDEX_SIZE,
    COL_NAMES_HEADER_SIZE, FORMAT_VERSION, STREAM_BYTE, STREAM_CHARACTER, STREAM_DOUBLE,
    STREAM_FACTOR, STREAM_INT32, STREAM_INT64, STREAM_LOGICAL, TABLE_HEADER_SIZE,
};
use crate::table::{
    check_lengths, Column, ColumnFactory, ColumnSlice, ReadInfo, TableMeta, TableSink, TableSource,
};
use crate::types::{ColumnAttribute, ColumnType, StringEncoding};

/// Handle to one RCF file on disk.
pub struct Store {
    path: PathBuf,
}

/// Everything parsed from nodes A, B, C and the column-names block.
struct ParsedMeta {
    header: TableHeader,
    keys: Vec<usize>,
    chunkset: ChunksetHeader,
    names: Vec<String>,
    /// File offset just past the column-names stream; node D starts here.
    col_names_end: u64,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Write engine ───────────────────────────────────────────────────────

    /// Serialize `table` to this store's path.
    ///
    /// `compression` in `[0, 100]` trades CPU for storage; see the column
    /// serializers for the exact mixing ladder. Overwrites any existing file.
    pub fn write(&self, table: &dyn TableSource, compression: u8) -> Result<()> {
        if compression > 100 {
            return Err(Error::BadCompression(compression));
        }
        let n_cols = table.n_cols();
        if n_cols == 0 {
            return Err(Error::NoColumns);
        }
        let n_rows = table.n_rows();
        if n_rows == 0 {
            return Err(Error::NoData);
        }
        if n_rows > i64::MAX as u64 {
            return Err(Error::TooManyRows(n_rows));
        }
        let keys = table.keys();
        if let Some(&bad) = keys.iter().find(|&&k| k >= n_cols) {
            return Err(Error::InvalidData(format!(
                "key position {bad} out of range for {n_cols} columns"
            )));
        }

        // One contiguous metadata buffer: A | B | C | column-names header.
        // A, B, and the names header are final now; C's type arrays and hash
        // are filled after the columns are streamed.
        let key_size = key_index_size(keys.len());
        let chunkset_size = chunkset_header_size(n_cols);
        let chunkset_off = TABLE_HEADER_SIZE + key_size;
        let names_off = chunkset_off + chunkset_size;
        let meta_size = names_off + COL_NAMES_HEADER_SIZE;
        let mut meta = vec![0u8; meta_size];

        let header = TableHeader {
            version: FORMAT_VERSION,
            flags: 0,
            version_max: FORMAT_VERSION,
            n_cols,
            primary_chunkset_loc: chunkset_off as u64,
            key_length: keys.len(),
        };
        header.write_to(&mut meta[..TABLE_HEADER_SIZE]);
        write_key_index(&mut meta[TABLE_HEADER_SIZE..chunkset_off], &keys);
        let mut chunkset = ChunksetHeader::new(n_cols, n_rows);
        write_col_names_header(&mut meta[names_off..]);

        let mut file = File::create(&self.path).map_err(Error::OpenWrite)?;
        file.write_all(&meta)?;

        let names: Vec<String> = (0..n_cols).map(|c| table.col_name(c).to_string()).collect();
        write_character(&mut file, &names, StringEncoding::Native, 0)?;

        // Placeholder for nodes D + E; patched once stream positions exist.
        let chunk_index_pos = file.stream_position()?;
        let de_size = CHUNK_INDEX_SIZE + data_chunk_header_size(n_cols);
        file.write_all(&vec![0u8; de_size])?;

        let mut position_data = vec![0u64; n_cols];
        for col in 0..n_cols {
            position_data[col] = file.stream_position()?;
            let info = table.column_info(col);
            let slice = table.column(col);
            check_lengths(&slice, n_rows, col)?;

            chunkset.col_attributes[col] = info.attribute as u16;
            chunkset.col_base_types[col] = slice.column_type() as u16;
            chunkset.col_scales[col] = info.scale as u16;

            match slice {
                ColumnSlice::Character { values, encoding } => {
                    chunkset.col_stream_types[col] = STREAM_CHARACTER;
                    write_character(&mut file, values, encoding, compression)?;
                }
                ColumnSlice::Factor {
                    codes,
                    levels,
                    encoding,
                } => {
                    chunkset.col_stream_types[col] = STREAM_FACTOR;
                    write_factor(
                        &mut file,
                        codes,
                        levels,
                        encoding,
                        compression,
                        &info.annotation,
                    )?;
                }
                ColumnSlice::Int32(values) => {
                    chunkset.col_stream_types[col] = STREAM_INT32;
                    write_int32(&mut file, values, compression, &info.annotation)?;
                }
                ColumnSlice::Double(values) => {
                    chunkset.col_stream_types[col] = STREAM_DOUBLE;
                    write_double(&mut file, values, compression, &info.annotation)?;
                }
                ColumnSlice::Logical(values) => {
                    chunkset.col_stream_types[col] = STREAM_LOGICAL;
                    write_logical(&mut file, values, compression, &info.annotation)?;
                }
                ColumnSlice::Int64(values) => {
                    chunkset.col_stream_types[col] = STREAM_INT64;
                    write_int64(&mut file, values, compression, &info.annotation)?;
                }
                ColumnSlice::Byte(values) => {
                    chunkset.col_stream_types[col] = STREAM_BYTE;
                    write_byte(&mut file, values, compression, &info.annotation)?;
                }
            }
        }
        let file_end = file.stream_position()?;

        let mut chunk_index = ChunkIndex::single(n_rows);
        chunk_index.chunk_pos[0] = position_data[0] - data_chunk_header_size(n_cols) as u64;
        debug_assert_eq!(
            chunk_index.chunk_pos[0] - CHUNK_INDEX_SIZE as u64,
            chunk_index_pos
        );
        let mut de_buf = vec![0u8; de_size];
        chunk_index.write_to(&mut de_buf[..CHUNK_INDEX_SIZE]);
        write_data_chunk_header(&mut de_buf[CHUNK_INDEX_SIZE..], &position_data);

        chunkset.write_to(&mut meta[chunkset_off..names_off]);

        // The two patch rewrites seal the file; a failure here leaves the
        // placeholder headers behind, so surface it as a write error.
        let seal = |file: &mut File| -> io::Result<()> {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&meta)?;
            file.seek(SeekFrom::Start(chunk_index_pos))?;
            file.write_all(&de_buf)?;
            file.flush()
        };
        seal(&mut file).map_err(Error::WriteError)?;

        debug!(
            "wrote {} ({n_cols} cols, {n_rows} rows, compression {compression}, {file_end} bytes)",
            self.path.display()
        );
        Ok(())
    }

    // ── Read engine ────────────────────────────────────────────────────────

    /// Read the table structure: names, types, attributes, scales, row
    /// count, key positions. Touches only the header tree and the
    /// column-names block.
    pub fn meta(&self) -> Result<TableMeta> {
        let mut file = self.open_read()?;
        let parsed = read_meta_blocks(&mut file)?;

        let types = parsed
            .chunkset
            .col_base_types
            .iter()
            .map(|&t| ColumnType::try_from(t))
            .collect::<Result<Vec<_>>>()?;
        let attributes = parsed
            .chunkset
            .col_attributes
            .iter()
            .map(|&a| ColumnAttribute::try_from(a))
            .collect::<Result<Vec<_>>>()?;
        let scales = parsed
            .chunkset
            .col_scales
            .iter()
            .map(|&s| s as i16)
            .collect();

        debug!(
            "meta {}: {} cols, {} rows",
            self.path.display(),
            parsed.header.n_cols,
            parsed.chunkset.n_rows
        );
        Ok(TableMeta {
            version: parsed.header.version_max,
            n_rows: parsed.chunkset.n_rows,
            keys: parsed.keys,
            names: parsed.names,
            types,
            attributes,
            scales,
        })
    }

    /// Materialize columns into `sink`.
    ///
    /// `selection` names the wanted columns (any order, `None` = all columns
    /// in table order). `start_row`/`end_row` are 1-based and inclusive;
    /// `end_row = None` reads to the last row. Containers come from
    /// `factory`; delivered columns carry the attribute, scale, annotation,
    /// and encoding stored in the file.
    pub fn read(
        &self,
        sink: &mut dyn TableSink,
        selection: Option<&[&str]>,
        start_row: u64,
        end_row: Option<u64>,
        factory: &dyn ColumnFactory,
    ) -> Result<ReadInfo> {
        let mut file = self.open_read()?;
        let parsed = read_meta_blocks(&mut file)?;
        let n_cols = parsed.header.n_cols;

        // Nodes D + E sit directly after the column-names stream.
        let de_size = CHUNK_INDEX_SIZE + data_chunk_header_size(n_cols);
        file.seek(SeekFrom::Start(parsed.col_names_end))?;
        let mut de_buf = vec![0u8; de_size];
        file.read_exact(&mut de_buf)?;
        let chunk_index = ChunkIndex::read_from(&de_buf[..CHUNK_INDEX_SIZE])?;
        let position_data = read_data_chunk_header(&de_buf[CHUNK_INDEX_SIZE..], n_cols)?;
        let n_rows = chunk_index.chunk_rows[0];

        let col_index: Vec<usize> = match selection {
            None => (0..n_cols).collect(),
            Some(wanted) => wanted
                .iter()
                .map(|want| {
                    parsed
                        .names
                        .iter()
                        .position(|name| name == want)
                        .ok_or_else(|| Error::ColumnNotFound((*want).to_string()))
                })
                .collect::<Result<Vec<_>>>()?,
        };

        let (first_row, length) = resolve_range(start_row, end_row, n_rows)?;
        sink.init(col_index.len(), length);

        for (sel, &col) in col_index.iter().enumerate() {
            let attribute = ColumnAttribute::try_from(parsed.chunkset.col_attributes[col])?;
            let scale = parsed.chunkset.col_scales[col] as i16;
            let pos = position_data[col];
            let column = read_one_column(
                &mut file,
                parsed.chunkset.col_stream_types[col],
                pos,
                first_row,
                length,
                n_rows,
                attribute,
                scale,
                factory,
            )?;
            sink.set_column(sel, column);
        }

        // Keys survive a selection as a prefix: collection stops at the
        // first key column that was not selected.
        let mut key_index = Vec::new();
        for key_pos in &parsed.keys {
            match col_index.iter().position(|&ci| ci == *key_pos) {
                Some(p) => key_index.push(p),
                None => break,
            }
        }
        let selected_cols: Vec<String> = col_index
            .iter()
            .map(|&ci| parsed.names[ci].clone())
            .collect();

        debug!(
            "read {}: {} of {} cols, rows [{start_row}, {}]",
            self.path.display(),
            col_index.len(),
            n_cols,
            first_row + length
        );
        Ok(ReadInfo {
            key_index,
            selected_cols,
        })
    }

    /// Read every column and every row.
    pub fn read_all(&self, sink: &mut dyn TableSink, factory: &dyn ColumnFactory) -> Result<ReadInfo> {
        self.read(sink, None, 1, None, factory)
    }

    fn open_read(&self) -> Result<File> {
        File::open(&self.path).map_err(Error::OpenRead)
    }
}

/// Parse and verify nodes A, B, C and the column-names block.
fn read_meta_blocks(file: &mut File) -> Result<ParsedMeta> {
    let mut a_buf = vec![0u8; TABLE_HEADER_SIZE];
    file.read_exact(&mut a_buf).map_err(Error::OpenRead)?;
    let header = TableHeader::read_from(&a_buf)?;

    if header.version_max > FORMAT_VERSION {
        return Err(Error::UnsupportedVersion {
            required: header.version_max,
            supported: FORMAT_VERSION,
        });
    }

    let n_cols = header.n_cols;
    let key_size = key_index_size(header.key_length);
    let chunkset_size = chunkset_header_size(n_cols);
    let rest = key_size + chunkset_size + COL_NAMES_HEADER_SIZE;
    let mut buf = vec![0u8; rest];
    file.read_exact(&mut buf)?;

    let keys = read_key_index(&buf[..key_size], header.key_length)?;
    let chunkset = ChunksetHeader::read_from(&buf[key_size..key_size + chunkset_size], n_cols)?;
    check_col_names_header(&buf[key_size + chunkset_size..])?;

    let names_pos = (TABLE_HEADER_SIZE + rest) as u64;
    let names = read_character(file, names_pos, 0, n_cols as u64, n_cols as u64)?;

    Ok(ParsedMeta {
        header,
        keys,
        chunkset,
        names: names.values,
        col_names_end: names.end_pos,
    })
}

/// Normalize a 1-based inclusive row range against the stored row count,
/// returning the 0-based first row and the length.
fn resolve_range(start_row: u64, end_row: Option<u64>, n_rows: u64) -> Result<(u64, u64)> {
    if start_row == 0 {
        return Err(Error::BadRange("fromRow must be positive"));
    }
    let first_row = start_row - 1;
    if first_row >= n_rows {
        return Err(Error::BadRange("row selection out of range"));
    }
    let mut length = n_rows - first_row;
    if let Some(end) = end_row {
        if end <= first_row {
            return Err(Error::BadRange("incorrect row range specified"));
        }
        length = end.min(n_rows) - first_row;
    }
    Ok((first_row, length))
}

fn factory_mismatch(expected: ColumnType) -> Error {
    Error::InvalidData(format!(
        "column factory returned a container of the wrong type (expected {expected:?})"
    ))
}

#[allow(clippy::too_many_arguments)]
fn read_one_column(
    file: &mut File,
    stream_type: u16,
    pos: u64,
    first_row: u64,
    length: u64,
    n_rows: u64,
    attribute: ColumnAttribute,
    scale: i16,
    factory: &dyn ColumnFactory,
) -> Result<Column> {
    let len = length as usize;
    Ok(match stream_type {
        STREAM_CHARACTER => {
            let mut column = factory.new_column(ColumnType::Character, len, attribute, scale);
            let Column::Character(c) = &mut column else {
                return Err(factory_mismatch(ColumnType::Character));
            };
            let slice = read_character(file, pos, first_row, length, n_rows)?;
            c.values = slice.values;
            c.encoding = slice.encoding;
            column
        }
        STREAM_FACTOR => {
            let mut column = factory.new_column(ColumnType::Factor, len, attribute, scale);
            let Column::Factor(c) = &mut column else {
                return Err(factory_mismatch(ColumnType::Factor));
            };
            let slice = read_factor(file, &mut c.codes, pos, first_row, n_rows)?;
            c.levels = slice.levels;
            c.encoding = slice.encoding;
            c.annotation = slice.annotation;
            column
        }
        STREAM_INT32 => {
            let mut column = factory.new_column(ColumnType::Int32, len, attribute, scale);
            let Column::Int32(c) = &mut column else {
                return Err(factory_mismatch(ColumnType::Int32));
            };
            c.annotation = read_int32(file, &mut c.values, pos, first_row, n_rows)?.annotation;
            column
        }
        STREAM_DOUBLE => {
            let mut column = factory.new_column(ColumnType::Double, len, attribute, scale);
            let Column::Double(c) = &mut column else {
                return Err(factory_mismatch(ColumnType::Double));
            };
            c.annotation = read_double(file, &mut c.values, pos, first_row, n_rows)?.annotation;
            column
        }
        STREAM_LOGICAL => {
            let mut column = factory.new_column(ColumnType::Logical, len, attribute, scale);
            let Column::Logical(c) = &mut column else {
                return Err(factory_mismatch(ColumnType::Logical));
            };
            c.annotation = read_logical(file, &mut c.values, pos, first_row, n_rows)?.annotation;
            column
        }
        STREAM_INT64 => {
            let mut column = factory.new_column(ColumnType::Int64, len, attribute, scale);
            let Column::Int64(c) = &mut column else {
                return Err(factory_mismatch(ColumnType::Int64));
            };
            c.annotation = read_int64(file, &mut c.values, pos, first_row, n_rows)?.annotation;
            column
        }
        STREAM_BYTE => {
            let mut column = factory.new_column(ColumnType::Byte, len, attribute, scale);
            let Column::Byte(c) = &mut column else {
                return Err(factory_mismatch(ColumnType::Byte));
            };
            c.annotation = read_byte(file, &mut c.values, pos, first_row, n_rows)?.annotation;
            column
        }
        other => return Err(Error::UnknownColumnType(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_normalization() {
        // full table
        assert_eq!(resolve_range(1, None, 10).unwrap(), (0, 10));
        // inclusive range
        assert_eq!(resolve_range(2, Some(3), 10).unwrap(), (1, 2));
        // end clamped to the table
        assert_eq!(resolve_range(5, Some(100), 10).unwrap(), (4, 6));
        // single row
        assert_eq!(resolve_range(10, Some(10), 10).unwrap(), (9, 1));
    }

    #[test]
    fn range_rejections() {
        assert!(matches!(
            resolve_range(0, None, 10),
            Err(Error::BadRange("fromRow must be positive"))
        ));
        assert!(matches!(
            resolve_range(11, None, 10),
            Err(Error::BadRange("row selection out of range"))
        ));
        assert!(matches!(
            resolve_range(5, Some(4), 10),
            Err(Error::BadRange("incorrect row range specified"))
        ));
        assert!(matches!(
            resolve_range(5, Some(3), 10),
            Err(Error::BadRange("incorrect row range specified"))
        ));
    }
}
