//! In-memory reference dataset.
//!
//! `MemTable` is the crate's own host binding: it implements [`TableSource`]
//! so it can be written, and [`TableSink`] so a `read` can materialize into
//! it. The test suite round-trips through it; embedders with their own array
//! types implement the same traits instead.

use crate::error::{Error, Result};
use crate::table::{Column, ColumnInfo, ColumnSlice, TableSink, TableSource};

#[derive(Debug, Clone, Default)]
pub struct MemTable {
    n_rows: u64,
    keys: Vec<usize>,
    names: Vec<String>,
    infos: Vec<ColumnInfo>,
    columns: Vec<Column>,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. The first column fixes the table's row count; every
    /// later column must match it. The column's own attribute, scale, and
    /// annotation become its write-side metadata.
    pub fn push_column(&mut self, name: &str, column: Column) -> Result<&mut Self> {
        let info = column.info();
        self.push_column_with(name, column, info)
    }

    /// Append a column with explicit attribute, scale, and annotation.
    pub fn push_column_with(
        &mut self,
        name: &str,
        column: Column,
        info: ColumnInfo,
    ) -> Result<&mut Self> {
        if self.columns.is_empty() {
            self.n_rows = column.len() as u64;
        } else if column.len() as u64 != self.n_rows {
            return Err(Error::InvalidData(format!(
                "column {name:?} holds {} values, table holds {} rows",
                column.len(),
                self.n_rows
            )));
        }
        self.names.push(name.to_string());
        self.infos.push(info);
        self.columns.push(column);
        Ok(self)
    }

    /// Declare key columns by position, in key order.
    pub fn set_keys(&mut self, keys: Vec<usize>) -> Result<()> {
        if let Some(&bad) = keys.iter().find(|&&k| k >= self.columns.len()) {
            return Err(Error::InvalidData(format!(
                "key position {bad} out of range for {} columns",
                self.columns.len()
            )));
        }
        self.keys = keys;
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }
}

impl TableSource for MemTable {
    fn n_cols(&self) -> usize {
        self.columns.len()
    }

    fn n_rows(&self) -> u64 {
        self.n_rows
    }

    fn keys(&self) -> Vec<usize> {
        self.keys.clone()
    }

    fn col_name(&self, col: usize) -> &str {
        &self.names[col]
    }

    fn column_info(&self, col: usize) -> ColumnInfo {
        self.infos[col].clone()
    }

    fn column(&self, col: usize) -> ColumnSlice<'_> {
        self.columns[col].as_slice()
    }
}

impl TableSink for MemTable {
    fn init(&mut self, n_selected: usize, n_rows: u64) {
        self.n_rows = n_rows;
        self.keys.clear();
        self.names = vec![String::new(); n_selected];
        self.infos = vec![ColumnInfo::plain(Default::default()); n_selected];
        self.columns = vec![Column::Byte(Default::default()); n_selected];
    }

    fn set_column(&mut self, sel: usize, column: Column) {
        self.columns[sel] = column;
    }
}

impl MemTable {
    /// Adopt the names a `read` reports for its selection, in order.
    pub fn set_names(&mut self, names: &[String]) {
        self.names = names.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ByteColumn, Int32Column};

    #[test]
    fn row_count_fixed_by_first_column() {
        let mut table = MemTable::new();
        table
            .push_column(
                "a",
                Column::Int32(Int32Column {
                    values: vec![1, 2, 3],
                    attribute: Default::default(),
                    scale: 0,
                    annotation: String::new(),
                }),
            )
            .unwrap();

        let err = table
            .push_column(
                "b",
                Column::Byte(ByteColumn {
                    values: vec![0; 4],
                    ..Default::default()
                }),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn keys_validated_against_width() {
        let mut table = MemTable::new();
        table
            .push_column(
                "a",
                Column::Byte(ByteColumn {
                    values: vec![1],
                    ..Default::default()
                }),
            )
            .unwrap();
        assert!(table.set_keys(vec![0]).is_ok());
        assert!(table.set_keys(vec![1]).is_err());
    }
}
