//! Vertical concatenation of several tables.
//!
//! Output columns are the union of the input columns in first-seen order.
//! Rows from a source lacking a column get a missing cell there, and column
//! types are re-inferred over the combined rows.

use std::collections::HashMap;

use log::{debug, info};

use crate::{
    error::MergeError,
    table::{Column, Row, Table},
};

pub fn append_tables(sources: &[(&str, &Table)]) -> Result<Table, MergeError> {
    let valid: Vec<&(&str, &Table)> = sources
        .iter()
        .filter(|(name, table)| {
            let usable = table.column_count() > 0;
            if !usable {
                debug!("Skipping '{name}': no columns");
            }
            usable
        })
        .collect();
    if valid.is_empty() {
        return Err(MergeError::InsufficientSources {
            valid: 0,
            required: 1,
        });
    }

    let mut columns: Vec<Column> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (_, table) in &valid {
        for column in table.columns() {
            if !positions.contains_key(&column.name) {
                positions.insert(column.name.clone(), columns.len());
                columns.push(column.clone());
            }
        }
    }

    let mut rows: Vec<Row> = Vec::new();
    for (name, table) in &valid {
        let targets: Vec<usize> = table
            .columns()
            .iter()
            .map(|c| positions[&c.name])
            .collect();
        for row in table.rows() {
            let mut combined: Row = vec![None; columns.len()];
            for (cell, target) in row.iter().zip(&targets) {
                combined[*target] = cell.clone();
            }
            rows.push(combined);
        }
        info!("Appended {} row(s) from '{}'", table.row_count(), name);
    }

    Ok(Table::assemble(columns, rows).infer_types())
}
