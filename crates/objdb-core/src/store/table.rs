//! Tables: named, ordered collections of typed columns over shared rows.

use super::value::{Cell, ColumnType, StoreError};
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::HashSet;

/// A single typed column.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct Column {
    /// Column name (unique within the table).
    name: String,
    /// Column type tag.
    ty: ColumnType,
    /// Whether cells may be null.
    nullable: bool,
    /// Whether a search index is attached.
    indexed: bool,
    /// Target table name for link columns.
    link_target: Option<String>,
    /// Cell values, one per row.
    cells: Vec<Cell>,
}

/// A table: uniform rows across an ordered set of columns.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
pub struct Table {
    name: String,
    rows: u64,
    columns: Vec<Column>,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: 0,
            columns: Vec::new(),
        }
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn size(&self) -> u64 {
        self.rows
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    fn col(&self, index: usize) -> Result<&Column, StoreError> {
        self.columns
            .get(index)
            .ok_or(StoreError::ColumnOutOfBounds(index))
    }

    fn col_mut(&mut self, index: usize) -> Result<&mut Column, StoreError> {
        self.columns
            .get_mut(index)
            .ok_or(StoreError::ColumnOutOfBounds(index))
    }

    fn check_row(&self, row: u64) -> Result<usize, StoreError> {
        if row >= self.rows {
            return Err(StoreError::RowOutOfBounds(row));
        }
        Ok(row as usize)
    }

    /// Column name at `index`.
    pub fn column_name(&self, index: usize) -> Result<&str, StoreError> {
        Ok(&self.col(index)?.name)
    }

    /// Column type at `index`.
    pub fn column_type(&self, index: usize) -> Result<ColumnType, StoreError> {
        Ok(self.col(index)?.ty)
    }

    /// Index of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Whether the column at `index` has a search index.
    pub fn has_search_index(&self, index: usize) -> Result<bool, StoreError> {
        Ok(self.col(index)?.indexed)
    }

    /// Whether the column at `index` is nullable.
    pub fn is_nullable(&self, index: usize) -> Result<bool, StoreError> {
        Ok(self.col(index)?.nullable)
    }

    /// Link target table name for a link column.
    pub fn link_target(&self, index: usize) -> Result<&str, StoreError> {
        let col = self.col(index)?;
        col.link_target
            .as_deref()
            .ok_or_else(|| StoreError::NotALinkColumn(col.name.clone()))
    }

    /// Insert a scalar column at `index`, backfilling existing rows.
    pub fn insert_column(
        &mut self,
        index: usize,
        ty: ColumnType,
        name: impl Into<String>,
        nullable: bool,
    ) -> Result<(), StoreError> {
        let name = name.into();
        if ty.is_link() {
            return Err(StoreError::NotALinkColumn(name));
        }
        if index > self.columns.len() {
            return Err(StoreError::ColumnOutOfBounds(index));
        }
        let cells = vec![Cell::default_for(ty, nullable); self.rows as usize];
        self.columns.insert(
            index,
            Column {
                name,
                ty,
                nullable,
                indexed: false,
                link_target: None,
                cells,
            },
        );
        Ok(())
    }

    /// Insert a link column at `index` pointing at `target`.
    pub fn insert_column_link(
        &mut self,
        index: usize,
        ty: ColumnType,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), StoreError> {
        let name = name.into();
        if !ty.is_link() {
            return Err(StoreError::TypeMismatch {
                column: name,
                expected: ColumnType::Link,
                found: ty,
            });
        }
        if index > self.columns.len() {
            return Err(StoreError::ColumnOutOfBounds(index));
        }
        let cells = vec![Cell::default_for(ty, false); self.rows as usize];
        self.columns.insert(
            index,
            Column {
                name,
                ty,
                nullable: false,
                indexed: false,
                link_target: Some(target.into()),
                cells,
            },
        );
        Ok(())
    }

    /// Remove the column at `index`.
    pub fn remove_column(&mut self, index: usize) -> Result<(), StoreError> {
        if index >= self.columns.len() {
            return Err(StoreError::ColumnOutOfBounds(index));
        }
        self.columns.remove(index);
        Ok(())
    }

    /// Rename the column at `index`.
    pub fn rename_column(
        &mut self,
        index: usize,
        new_name: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.col_mut(index)?.name = new_name.into();
        Ok(())
    }

    /// Attach a search index to the column at `index`.
    pub fn add_search_index(&mut self, index: usize) -> Result<(), StoreError> {
        let col = self.col_mut(index)?;
        if !col.ty.is_indexable() {
            return Err(StoreError::IndexNotSupported(col.ty));
        }
        col.indexed = true;
        Ok(())
    }

    /// Detach the search index from the column at `index`.
    pub fn remove_search_index(&mut self, index: usize) -> Result<(), StoreError> {
        self.col_mut(index)?.indexed = false;
        Ok(())
    }

    /// Append one empty row, filled with per-column defaults.
    pub fn add_empty_row(&mut self) -> u64 {
        for col in &mut self.columns {
            col.cells.push(Cell::default_for(col.ty, col.nullable));
        }
        self.rows += 1;
        self.rows - 1
    }

    /// Append `count` empty rows; returns the index of the first.
    pub fn add_empty_rows(&mut self, count: u64) -> u64 {
        let first = self.rows;
        for _ in 0..count {
            self.add_empty_row();
        }
        first
    }

    /// Remove the row at `index`.
    pub fn remove_row(&mut self, row: u64) -> Result<(), StoreError> {
        let idx = self.check_row(row)?;
        for col in &mut self.columns {
            col.cells.remove(idx);
        }
        self.rows -= 1;
        Ok(())
    }

    /// Find the first row whose string cell equals `value`.
    pub fn find_first_string(&self, index: usize, value: &str) -> Result<Option<u64>, StoreError> {
        let col = self.col(index)?;
        self.expect_type(col, ColumnType::String)?;
        Ok(col
            .cells
            .iter()
            .position(|c| matches!(c, Cell::String(s) if s == value))
            .map(|i| i as u64))
    }

    /// Whether the cell at `(index, row)` is null.
    pub fn is_null(&self, index: usize, row: u64) -> Result<bool, StoreError> {
        let idx = self.check_row(row)?;
        Ok(matches!(self.col(index)?.cells[idx], Cell::Null))
    }

    /// Count distinct cell values in the column at `index`.
    pub fn distinct_count(&self, index: usize) -> Result<u64, StoreError> {
        let col = self.col(index)?;
        let distinct: HashSet<Vec<u8>> = col.cells.iter().map(Cell::key).collect();
        Ok(distinct.len() as u64)
    }

    fn expect_type(&self, col: &Column, expected: ColumnType) -> Result<(), StoreError> {
        if col.ty != expected {
            return Err(StoreError::TypeMismatch {
                column: col.name.clone(),
                expected,
                found: col.ty,
            });
        }
        Ok(())
    }

    fn cell(&self, index: usize, row: u64, expected: ColumnType) -> Result<&Cell, StoreError> {
        let idx = self.check_row(row)?;
        let col = self.col(index)?;
        self.expect_type(col, expected)?;
        Ok(&col.cells[idx])
    }

    fn set_cell(
        &mut self,
        index: usize,
        row: u64,
        expected: ColumnType,
        value: Cell,
    ) -> Result<(), StoreError> {
        let idx = self.check_row(row)?;
        let col = self.col(index)?;
        self.expect_type(col, expected)?;
        self.columns[index].cells[idx] = value;
        Ok(())
    }

    /// Read an integer cell; null reads as 0.
    pub fn get_int(&self, index: usize, row: u64) -> Result<i64, StoreError> {
        match self.cell(index, row, ColumnType::Int)? {
            Cell::Int(v) => Ok(*v),
            _ => Ok(0),
        }
    }

    /// Write an integer cell.
    pub fn set_int(&mut self, index: usize, row: u64, value: i64) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::Int, Cell::Int(value))
    }

    /// Read a boolean cell; null reads as false.
    pub fn get_bool(&self, index: usize, row: u64) -> Result<bool, StoreError> {
        match self.cell(index, row, ColumnType::Bool)? {
            Cell::Bool(v) => Ok(*v),
            _ => Ok(false),
        }
    }

    /// Write a boolean cell.
    pub fn set_bool(&mut self, index: usize, row: u64, value: bool) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::Bool, Cell::Bool(value))
    }

    /// Read a float cell; null reads as 0.0.
    pub fn get_float(&self, index: usize, row: u64) -> Result<f32, StoreError> {
        match self.cell(index, row, ColumnType::Float)? {
            Cell::Float(v) => Ok(*v),
            _ => Ok(0.0),
        }
    }

    /// Write a float cell.
    pub fn set_float(&mut self, index: usize, row: u64, value: f32) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::Float, Cell::Float(value))
    }

    /// Read a double cell; null reads as 0.0.
    pub fn get_double(&self, index: usize, row: u64) -> Result<f64, StoreError> {
        match self.cell(index, row, ColumnType::Double)? {
            Cell::Double(v) => Ok(*v),
            _ => Ok(0.0),
        }
    }

    /// Write a double cell.
    pub fn set_double(&mut self, index: usize, row: u64, value: f64) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::Double, Cell::Double(value))
    }

    /// Read a string cell; null reads as the empty string.
    pub fn get_string(&self, index: usize, row: u64) -> Result<String, StoreError> {
        match self.cell(index, row, ColumnType::String)? {
            Cell::String(v) => Ok(v.clone()),
            _ => Ok(String::new()),
        }
    }

    /// Write a string cell.
    pub fn set_string(
        &mut self,
        index: usize,
        row: u64,
        value: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::String, Cell::String(value.into()))
    }

    /// Read a binary cell; null reads as empty.
    pub fn get_data(&self, index: usize, row: u64) -> Result<Vec<u8>, StoreError> {
        match self.cell(index, row, ColumnType::Data)? {
            Cell::Data(v) => Ok(v.clone()),
            _ => Ok(Vec::new()),
        }
    }

    /// Write a binary cell.
    pub fn set_data(&mut self, index: usize, row: u64, value: Vec<u8>) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::Data, Cell::Data(value))
    }

    /// Read a date cell; null reads as 0.
    pub fn get_date(&self, index: usize, row: u64) -> Result<i64, StoreError> {
        match self.cell(index, row, ColumnType::Date)? {
            Cell::Date(v) => Ok(*v),
            _ => Ok(0),
        }
    }

    /// Write a date cell.
    pub fn set_date(&mut self, index: usize, row: u64, value: i64) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::Date, Cell::Date(value))
    }

    /// Read a to-one link cell.
    pub fn get_link(&self, index: usize, row: u64) -> Result<Option<u64>, StoreError> {
        match self.cell(index, row, ColumnType::Link)? {
            Cell::Link(v) => Ok(*v),
            _ => Ok(None),
        }
    }

    /// Write a to-one link cell.
    pub fn set_link(
        &mut self,
        index: usize,
        row: u64,
        target_row: Option<u64>,
    ) -> Result<(), StoreError> {
        self.set_cell(index, row, ColumnType::Link, Cell::Link(target_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_table() -> Table {
        let mut table = Table::new("class_object");
        table.insert_column(0, ColumnType::Int, "value", false).unwrap();
        table
    }

    #[test]
    fn test_insert_column_backfills_rows() {
        let mut table = int_table();
        table.add_empty_rows(3);
        table.insert_column(1, ColumnType::String, "name", false).unwrap();

        assert_eq!(table.column_count(), 2);
        assert_eq!(table.get_string(1, 2).unwrap(), "");
    }

    #[test]
    fn test_typed_accessors() {
        let mut table = int_table();
        let row = table.add_empty_row();
        table.set_int(0, row, 42).unwrap();

        assert_eq!(table.get_int(0, row).unwrap(), 42);
        assert!(matches!(
            table.get_string(0, row),
            Err(StoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_nullable_defaults() {
        let mut table = Table::new("class_object");
        table.insert_column(0, ColumnType::Int, "value", true).unwrap();
        let row = table.add_empty_row();

        assert!(table.is_null(0, row).unwrap());
        assert_eq!(table.get_int(0, row).unwrap(), 0);

        table.set_int(0, row, 7).unwrap();
        assert!(!table.is_null(0, row).unwrap());
    }

    #[test]
    fn test_search_index_eligibility() {
        let mut table = Table::new("class_object");
        table.insert_column(0, ColumnType::Float, "value", false).unwrap();
        assert!(matches!(
            table.add_search_index(0),
            Err(StoreError::IndexNotSupported(ColumnType::Float))
        ));

        table.insert_column(1, ColumnType::String, "name", false).unwrap();
        table.add_search_index(1).unwrap();
        assert!(table.has_search_index(1).unwrap());
        table.remove_search_index(1).unwrap();
        assert!(!table.has_search_index(1).unwrap());
    }

    #[test]
    fn test_link_columns() {
        let mut table = Table::new("class_origin");
        table
            .insert_column_link(0, ColumnType::Link, "target", "class_target")
            .unwrap();

        assert_eq!(table.link_target(0).unwrap(), "class_target");
        let row = table.add_empty_row();
        assert_eq!(table.get_link(0, row).unwrap(), None);
        table.set_link(0, row, Some(3)).unwrap();
        assert_eq!(table.get_link(0, row).unwrap(), Some(3));
    }

    #[test]
    fn test_find_first_string_and_remove_row() {
        let mut table = Table::new("pk");
        table.insert_column(0, ColumnType::String, "pk_table", false).unwrap();
        table.add_empty_rows(2);
        table.set_string(0, 0, "a").unwrap();
        table.set_string(0, 1, "b").unwrap();

        assert_eq!(table.find_first_string(0, "b").unwrap(), Some(1));
        table.remove_row(0).unwrap();
        assert_eq!(table.find_first_string(0, "b").unwrap(), Some(0));
        assert_eq!(table.find_first_string(0, "a").unwrap(), None);
    }

    #[test]
    fn test_distinct_count() {
        let mut table = int_table();
        table.add_empty_rows(3);
        table.set_int(0, 0, 1).unwrap();
        table.set_int(0, 1, 1).unwrap();
        table.set_int(0, 2, 2).unwrap();

        assert_eq!(table.distinct_count(0).unwrap(), 2);
    }
}
