//! Delimited-text payload to [`Table`] conversion.
//!
//! Loading is a pure function of the input bytes: decode, detect the
//! delimiter when none is declared, read the records, normalize the header
//! names, and infer each column's type.

use std::collections::{HashMap, HashSet};

use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    data::is_null_token,
    error::ParseError,
    io_utils,
    printable_delimiter,
    schema::ColumnType,
    table::{Column, Row, Table},
};

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub has_headers: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            has_headers: true,
        }
    }
}

pub fn load_table(bytes: &[u8], options: &LoadOptions) -> Result<Table, ParseError> {
    let text = io_utils::decode_bytes(bytes, options.encoding)?;
    if text.trim().is_empty() {
        return Ok(Table::default());
    }
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| io_utils::detect_delimiter(&text));
    debug!("Reading table with delimiter '{}'", printable_delimiter(delimiter));

    let mut reader = io_utils::open_csv_reader(text.as_bytes(), delimiter, false);
    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| ParseError::Malformed {
            line: err.position().map(|p| p.line()).unwrap_or_default(),
            message: err.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let cells: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
        records.push((line, cells));
    }

    let mut records = records.into_iter();
    let columns = if options.has_headers {
        let Some((_, header)) = records.next() else {
            return Ok(Table::default());
        };
        // Header names are taken literally; only blanks become placeholders.
        let header: Row = header
            .into_iter()
            .map(|name| (!name.is_empty()).then_some(name))
            .collect();
        header_columns(&header)
    } else {
        Vec::new()
    };

    let mut rows: Vec<Row> = Vec::new();
    let width = if options.has_headers {
        columns.len()
    } else {
        usize::MAX
    };
    let mut widest = 0usize;
    for (line, raw) in records {
        let mut cells: Row = raw.into_iter().map(normalize_cell).collect();
        if cells.len() > width {
            if cells[width..].iter().any(Option::is_some) {
                return Err(ParseError::RaggedRow {
                    line,
                    expected: width,
                    found: cells.len(),
                });
            }
            cells.truncate(width);
        }
        widest = widest.max(cells.len());
        rows.push(cells);
    }

    let columns = if options.has_headers {
        columns
    } else {
        (1..=widest)
            .map(|n| Column::new(format!("column_{n}"), ColumnType::String))
            .collect()
    };
    for row in &mut rows {
        row.resize(columns.len(), None);
    }

    let table = Table::assemble(columns, rows).infer_types();
    debug!(
        "Loaded {} row(s) across {} column(s): {}",
        table.row_count(),
        table.column_count(),
        table
            .columns()
            .iter()
            .map(|c| format!("{}:{}", c.name, c.kind))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(table)
}

/// Re-headers a table from its first data row. Blank or `nan`-like entries
/// become `unknown_<index>` placeholders and repeated names are suffixed.
pub fn promote_first_row(table: &Table) -> Result<Table, ParseError> {
    let (_, rows) = table.clone().into_parts();
    let mut rows = rows.into_iter();
    let header = rows.next().ok_or(ParseError::NoHeaderRow)?;
    let columns = header_columns(&header);
    Ok(Table::assemble(columns, rows.collect()).infer_types())
}

fn normalize_cell(cell: String) -> Option<String> {
    if is_null_token(&cell) {
        None
    } else {
        Some(cell)
    }
}

fn header_columns(header: &[Option<String>]) -> Vec<Column> {
    let named: Vec<(String, bool)> = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell {
            Some(name) => (name.trim().to_string(), false),
            None => (format!("unknown_{idx}"), true),
        })
        .collect();
    let unique = deduplicate_names(named.iter().map(|(name, _)| name.as_str()));
    unique
        .into_iter()
        .zip(named)
        .map(|(name, (_, placeholder))| {
            if placeholder {
                Column::placeholder(name)
            } else {
                Column::new(name, ColumnType::String)
            }
        })
        .collect()
}

/// Suffixes repeated names with `_<n>` (n counting repeats from 1), keeping
/// first-seen order. A suffixed name never collides with another name.
pub fn deduplicate_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    let mut used: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<&str, usize> = HashMap::new();
    let mut result = Vec::with_capacity(names.len());
    for name in &names {
        if used.insert((*name).to_string()) {
            result.push((*name).to_string());
            continue;
        }
        let counter = repeats.entry(*name).or_insert(0);
        let candidate = loop {
            *counter += 1;
            let candidate = format!("{name}_{counter}");
            if !used.contains(&candidate) && !names.contains(&candidate.as_str()) {
                break candidate;
            }
        };
        used.insert(candidate.clone());
        result.push(candidate);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Table {
        load_table(text.as_bytes(), &LoadOptions::default()).expect("load table")
    }

    #[test]
    fn header_names_are_trimmed_and_deduplicated() {
        let table = load(" id , name,name ,\n1,a,b,c\n");
        assert_eq!(table.headers(), vec!["id", "name", "name_1", "unknown_3"]);
        assert!(table.columns()[3].placeholder);
        assert!(!table.columns()[0].placeholder);
    }

    #[test]
    fn deduplicate_names_counts_each_repeat() {
        assert_eq!(
            deduplicate_names(["a", "a", "b", "a"]),
            vec!["a", "a_1", "b", "a_2"]
        );
        assert_eq!(deduplicate_names(["a", "a", "a_1"]), vec!["a", "a_2", "a_1"]);
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = load("");
        assert_eq!(table.column_count(), 0);
        assert_eq!(table.row_count(), 0);
        let blank = load("  \n\n");
        assert_eq!(blank.column_count(), 0);
    }

    #[test]
    fn header_only_input_has_columns_without_rows() {
        let table = load("a;b;c\n");
        assert_eq!(table.headers(), vec!["a", "b", "c"]);
        assert!(table.is_empty());
    }

    #[test]
    fn short_rows_are_padded_and_long_rows_rejected() {
        let table = load("a,b,c\n1,2\n");
        assert_eq!(table.cell(0, 2), None);

        let err = load_table(b"a,b\n1,2,3\n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::RaggedRow {
                line: 2,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn trailing_empty_fields_are_tolerated() {
        let table = load("a,b\n1,2,\n");
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cell(0, 1), Some("2"));
    }

    #[test]
    fn null_tokens_load_as_missing() {
        let table = load("a,b\nNaN,x\n3,\n");
        assert_eq!(table.cell(0, 0), None);
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.columns()[0].kind, ColumnType::Numeric);
    }

    #[test]
    fn null_like_header_names_are_kept() {
        let table = load("id,NA,null, \n1,2,3,4\n");
        assert_eq!(table.headers(), vec!["id", "NA", "null", "unknown_3"]);
        assert!(!table.columns()[1].placeholder);
        assert!(!table.columns()[2].placeholder);
        assert!(table.columns()[3].placeholder);
    }

    #[test]
    fn headerless_input_gets_positional_names() {
        let options = LoadOptions {
            has_headers: false,
            ..LoadOptions::default()
        };
        let table = load_table(b"1|x\n2|y|z\n", &options).unwrap();
        assert_eq!(table.headers(), vec!["column_1", "column_2", "column_3"]);
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn promote_first_row_reheaders_table() {
        let options = LoadOptions {
            has_headers: false,
            ..LoadOptions::default()
        };
        let raw = load_table(b"region,,region,nan\neu,1,x,y\n", &options).unwrap();
        let promoted = promote_first_row(&raw).unwrap();
        assert_eq!(
            promoted.headers(),
            vec!["region", "unknown_1", "region_1", "unknown_3"]
        );
        assert_eq!(promoted.row_count(), 1);
        assert_eq!(promoted.columns()[1].kind, ColumnType::Numeric);
    }

    #[test]
    fn promote_first_row_requires_a_row() {
        let table = load("a,b\n");
        assert!(matches!(
            promote_first_row(&table),
            Err(ParseError::NoHeaderRow)
        ));
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let table = load("name,note\n\"Smith, J\",\"said \"\"hi\"\"\"\n");
        assert_eq!(table.cell(0, 0), Some("Smith, J"));
        assert_eq!(table.cell(0, 1), Some("said \"hi\""));
    }
}
