//! Collaborator interfaces between the engine and a host binding.
//!
//! The write path pulls data through [`TableSource`]; the read path pushes
//! owned columns into a [`TableSink`], allocating them through a
//! [`ColumnFactory`]. Columns are tagged unions ([`ColumnSlice`] borrowed on
//! the way in, [`Column`] owned on the way out) rather than an interface
//! hierarchy; the serializer boundary dispatches on the variant.

use crate::error::{Error, Result};
use crate::types::{ColumnAttribute, ColumnType, StringEncoding};

/// Per-column metadata reported by a [`TableSource`].
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub attribute: ColumnAttribute,
    /// Signed power-of-ten exponent or a [`crate::types::TimeScale`] tag.
    pub scale: i16,
    /// Opaque UTF-8 string, typically a timezone name. Empty when unused.
    pub annotation: String,
}

impl ColumnInfo {
    pub fn plain(attribute: ColumnAttribute) -> Self {
        Self {
            attribute,
            scale: 0,
            annotation: String::new(),
        }
    }
}

/// Borrowed view of one column's values, handed to the write engine.
pub enum ColumnSlice<'a> {
    Character {
        values: &'a [String],
        encoding: StringEncoding,
    },
    Factor {
        /// 1-based level codes; 0 marks a missing value.
        codes: &'a [i32],
        levels: &'a [String],
        encoding: StringEncoding,
    },
    Int32(&'a [i32]),
    Double(&'a [f64]),
    Logical(&'a [Option<bool>]),
    Int64(&'a [i64]),
    Byte(&'a [u8]),
}

impl ColumnSlice<'_> {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnSlice::Character { .. } => ColumnType::Character,
            ColumnSlice::Factor { .. } => ColumnType::Factor,
            ColumnSlice::Int32(_) => ColumnType::Int32,
            ColumnSlice::Double(_) => ColumnType::Double,
            ColumnSlice::Logical(_) => ColumnType::Logical,
            ColumnSlice::Int64(_) => ColumnType::Int64,
            ColumnSlice::Byte(_) => ColumnType::Byte,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnSlice::Character { values, .. } => values.len(),
            ColumnSlice::Factor { codes, .. } => codes.len(),
            ColumnSlice::Int32(v) => v.len(),
            ColumnSlice::Double(v) => v.len(),
            ColumnSlice::Logical(v) => v.len(),
            ColumnSlice::Int64(v) => v.len(),
            ColumnSlice::Byte(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A dataset the write engine can serialize.
pub trait TableSource {
    fn n_cols(&self) -> usize;
    fn n_rows(&self) -> u64;
    /// Key column positions, in key order. May be empty.
    fn keys(&self) -> Vec<usize>;
    fn col_name(&self, col: usize) -> &str;
    fn column_info(&self, col: usize) -> ColumnInfo;
    fn column(&self, col: usize) -> ColumnSlice<'_>;
}

// ── Owned column containers (read side) ────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterColumn {
    pub values: Vec<String>,
    pub encoding: StringEncoding,
    pub attribute: ColumnAttribute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorColumn {
    /// 1-based level codes; 0 marks a missing value.
    pub codes: Vec<i32>,
    pub levels: Vec<String>,
    pub encoding: StringEncoding,
    pub attribute: ColumnAttribute,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Int32Column {
    pub values: Vec<i32>,
    pub attribute: ColumnAttribute,
    pub scale: i16,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoubleColumn {
    pub values: Vec<f64>,
    pub attribute: ColumnAttribute,
    pub scale: i16,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalColumn {
    pub values: Vec<Option<bool>>,
    pub attribute: ColumnAttribute,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Int64Column {
    pub values: Vec<i64>,
    pub attribute: ColumnAttribute,
    pub scale: i16,
    pub annotation: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ByteColumn {
    pub values: Vec<u8>,
    pub attribute: ColumnAttribute,
    pub annotation: String,
}

/// Owned column of any type; what the read engine hands to a [`TableSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Character(CharacterColumn),
    Factor(FactorColumn),
    Int32(Int32Column),
    Double(DoubleColumn),
    Logical(LogicalColumn),
    Int64(Int64Column),
    Byte(ByteColumn),
}

impl Column {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Character(_) => ColumnType::Character,
            Column::Factor(_) => ColumnType::Factor,
            Column::Int32(_) => ColumnType::Int32,
            Column::Double(_) => ColumnType::Double,
            Column::Logical(_) => ColumnType::Logical,
            Column::Int64(_) => ColumnType::Int64,
            Column::Byte(_) => ColumnType::Byte,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Character(c) => c.values.len(),
            Column::Factor(c) => c.codes.len(),
            Column::Int32(c) => c.values.len(),
            Column::Double(c) => c.values.len(),
            Column::Logical(c) => c.values.len(),
            Column::Int64(c) => c.values.len(),
            Column::Byte(c) => c.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The write-side metadata carried by this container.
    pub fn info(&self) -> ColumnInfo {
        match self {
            Column::Character(c) => ColumnInfo::plain(c.attribute),
            Column::Factor(c) => ColumnInfo {
                attribute: c.attribute,
                scale: 0,
                annotation: c.annotation.clone(),
            },
            Column::Int32(c) => ColumnInfo {
                attribute: c.attribute,
                scale: c.scale,
                annotation: c.annotation.clone(),
            },
            Column::Double(c) => ColumnInfo {
                attribute: c.attribute,
                scale: c.scale,
                annotation: c.annotation.clone(),
            },
            Column::Logical(c) => ColumnInfo {
                attribute: c.attribute,
                scale: 0,
                annotation: c.annotation.clone(),
            },
            Column::Int64(c) => ColumnInfo {
                attribute: c.attribute,
                scale: c.scale,
                annotation: c.annotation.clone(),
            },
            Column::Byte(c) => ColumnInfo {
                attribute: c.attribute,
                scale: 0,
                annotation: c.annotation.clone(),
            },
        }
    }

    /// Borrow this column as a write-side slice.
    pub fn as_slice(&self) -> ColumnSlice<'_> {
        match self {
            Column::Character(c) => ColumnSlice::Character {
                values: &c.values,
                encoding: c.encoding,
            },
            Column::Factor(c) => ColumnSlice::Factor {
                codes: &c.codes,
                levels: &c.levels,
                encoding: c.encoding,
            },
            Column::Int32(c) => ColumnSlice::Int32(&c.values),
            Column::Double(c) => ColumnSlice::Double(&c.values),
            Column::Logical(c) => ColumnSlice::Logical(&c.values),
            Column::Int64(c) => ColumnSlice::Int64(&c.values),
            Column::Byte(c) => ColumnSlice::Byte(&c.values),
        }
    }
}

/// Receives the columns materialized by a `read`.
pub trait TableSink {
    /// Called once, before any column, with the selection width and the
    /// number of rows every delivered column will hold.
    fn init(&mut self, n_selected: usize, n_rows: u64);

    /// Deliver the column at selection position `sel` (0-based, selection
    /// order). Ownership transfers to the sink.
    fn set_column(&mut self, sel: usize, column: Column);
}

/// Allocates column containers for the read path.
///
/// A host binding can substitute containers backed by its own memory layout;
/// the engine only requires that the returned variant matches the requested
/// type and already holds `len` elements.
pub trait ColumnFactory {
    fn new_column(
        &self,
        column_type: ColumnType,
        len: usize,
        attribute: ColumnAttribute,
        scale: i16,
    ) -> Column;
}

/// Factory building the crate's own containers, pre-filled with each type's
/// missing-value sentinel.
pub struct DefaultColumnFactory;

impl ColumnFactory for DefaultColumnFactory {
    fn new_column(
        &self,
        column_type: ColumnType,
        len: usize,
        attribute: ColumnAttribute,
        scale: i16,
    ) -> Column {
        match column_type {
            ColumnType::Character => Column::Character(CharacterColumn {
                values: vec![String::new(); len],
                encoding: StringEncoding::Native,
                attribute,
            }),
            ColumnType::Factor => Column::Factor(FactorColumn {
                codes: vec![crate::types::MISSING_FACTOR_CODE; len],
                levels: Vec::new(),
                encoding: StringEncoding::Native,
                attribute,
                annotation: String::new(),
            }),
            ColumnType::Int32 => Column::Int32(Int32Column {
                values: vec![crate::types::MISSING_INT32; len],
                attribute,
                scale,
                annotation: String::new(),
            }),
            ColumnType::Double => Column::Double(DoubleColumn {
                values: vec![crate::types::missing_double(); len],
                attribute,
                scale,
                annotation: String::new(),
            }),
            ColumnType::Logical => Column::Logical(LogicalColumn {
                values: vec![None; len],
                attribute,
                annotation: String::new(),
            }),
            ColumnType::Int64 => Column::Int64(Int64Column {
                values: vec![crate::types::MISSING_INT64; len],
                attribute,
                scale,
                annotation: String::new(),
            }),
            ColumnType::Byte => Column::Byte(ByteColumn {
                values: vec![0; len],
                attribute,
                annotation: String::new(),
            }),
        }
    }
}

/// Everything `meta` learns without touching column data.
#[derive(Debug, Clone)]
pub struct TableMeta {
    /// `versionMax` of the file: the minimum format version a reader needs.
    pub version: u32,
    pub n_rows: u64,
    pub keys: Vec<usize>,
    pub names: Vec<String>,
    pub types: Vec<ColumnType>,
    pub attributes: Vec<ColumnAttribute>,
    pub scales: Vec<i16>,
}

impl TableMeta {
    pub fn n_cols(&self) -> usize {
        self.names.len()
    }
}

/// Selection-dependent results of a `read`.
#[derive(Debug, Clone)]
pub struct ReadInfo {
    /// For each dataset key column present in the selection, its position
    /// in the selection — stopping at the first key column that was not
    /// selected (prefix-only preservation).
    pub key_index: Vec<usize>,
    /// Names of the materialized columns, in selection order.
    pub selected_cols: Vec<String>,
}

pub(crate) fn check_lengths(slice: &ColumnSlice<'_>, n_rows: u64, col: usize) -> Result<()> {
    if slice.len() as u64 != n_rows {
        return Err(Error::InvalidData(format!(
            "column {col} holds {} values, table declares {n_rows} rows",
            slice.len()
        )));
    }
    Ok(())
}
