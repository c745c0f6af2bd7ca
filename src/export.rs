//! Delimited-text export of a table.
//!
//! Exports are comma-separated with a header row and no index column.
//! Missing cells become empty fields, and fields are quoted only when needed.

use std::io::Write;

use anyhow::{Context, Result};

use crate::{io_utils, table::Table};

pub const CSV_MIME: &str = "text/csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(writer, io_utils::DEFAULT_CSV_DELIMITER);
    if table.column_count() > 0 {
        writer
            .write_record(table.headers())
            .context("Writing header row")?;
    }
    for (idx, row) in table.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(table, &mut buffer)?;
    Ok(buffer)
}

/// Packages a table for download under `<base_name>.csv`.
pub fn export_csv(table: &Table, base_name: &str) -> Result<Export> {
    let base = base_name.trim().trim_end_matches(".csv");
    let base = if base.is_empty() { "export" } else { base };
    Ok(Export {
        file_name: format!("{base}.csv"),
        mime: CSV_MIME,
        bytes: to_csv_bytes(table)?,
    })
}
