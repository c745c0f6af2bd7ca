//! In-memory table model shared by every core operation.
//!
//! A [`Table`] stores cells as trimmed text (or `None` for missing values)
//! alongside each column's inferred [`ColumnType`]. Typed access goes through
//! [`Table::typed_cell`], which reinterprets the text on demand; keeping the
//! original text means exports reproduce the loaded cells exactly.
//!
//! Tables are values: operations take `&Table` and return a new `Table`.

use std::collections::HashSet;

use anyhow::{Result, ensure};
use serde::Serialize;

use crate::{
    data::{Value, parse_typed_value},
    schema::{ColumnType, infer_column_type},
};

pub type Cell = Option<String>;
pub type Row = Vec<Cell>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    /// Set when the loader synthesized the name for a blank header.
    pub placeholder: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        Self {
            name: name.into(),
            kind,
            placeholder: false,
        }
    }

    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnType::String,
            placeholder: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>, rows: Vec<Row>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            ensure!(
                seen.insert(column.name.as_str()),
                "Duplicate column name '{}'",
                column.name
            );
        }
        for (idx, row) in rows.iter().enumerate() {
            ensure!(
                row.len() == columns.len(),
                "Row {} has {} cell(s) but the table defines {} column(s)",
                idx + 1,
                row.len(),
                columns.len()
            );
        }
        Ok(Self { columns, rows })
    }

    /// Builds a table from column names and text rows, inferring every
    /// column's type.
    pub fn from_rows(names: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let columns = names
            .into_iter()
            .map(|name| Column::new(name, ColumnType::String))
            .collect();
        Ok(Self::new(columns, rows)?.infer_types())
    }

    pub(crate) fn assemble(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        Self { columns, rows }
    }

    /// Re-runs type inference over every column.
    pub fn infer_types(mut self) -> Self {
        for idx in 0..self.columns.len() {
            let kind = infer_column_type(self.rows.iter().filter_map(|row| row[idx].as_deref()));
            self.columns[idx].kind = kind;
        }
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    pub fn typed_cell(&self, row: usize, column: usize) -> Option<Value> {
        let kind = self.columns.get(column)?.kind;
        self.cell(row, column)
            .map(|raw| parse_typed_value(raw, kind))
    }

    pub fn column_cells(&self, column: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column).and_then(|c| c.as_deref()))
    }

    /// Non-null text values of a column, in row order.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &str> + '_ {
        self.column_cells(column).flatten()
    }

    /// New table holding the given rows (by index) in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let rows = indices
            .iter()
            .filter_map(|idx| self.rows.get(*idx).cloned())
            .collect();
        Table::assemble(self.columns.clone(), rows)
    }

    /// New table keeping only the columns for which `keep` returns true.
    pub fn retain_columns<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&Column) -> bool,
    {
        let mask: Vec<bool> = self.columns.iter().map(&mut keep).collect();
        let columns = self
            .columns
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(c, _)| c.clone())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&mask)
                    .filter(|(_, keep)| **keep)
                    .map(|(cell, _)| cell.clone())
                    .collect()
            })
            .collect();
        Table::assemble(columns, rows)
    }

    pub fn into_parts(self) -> (Vec<Column>, Vec<Row>) {
        (self.columns, self.rows)
    }
}
