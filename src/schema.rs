//! Column type model and inference.
//!
//! A column is classified by testing its non-null values in a fixed order:
//! numeric first, then datetime, then string as the fallback. The first
//! classification that accepts *every* value wins, so a column of bare digit
//! strings resolves to numeric even when a date format could also read it.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::{
    data::{parse_number, parse_temporal},
    table::Table,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    #[serde(rename = "datetime")]
    DateTime,
    #[default]
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::DateTime => "datetime",
            ColumnType::String => "string",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["numeric", "datetime", "string"]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "numeric" | "number" | "float" | "integer" => Ok(ColumnType::Numeric),
            "datetime" | "date" => Ok(ColumnType::DateTime),
            "string" | "text" => Ok(ColumnType::String),
            other => Err(anyhow!(
                "Unknown column type '{other}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

/// Classifies a column from its non-null values.
pub fn infer_column_type<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidate = TypeCandidate::default();
    for value in values {
        candidate.update(value);
        if candidate.settled() {
            break;
        }
    }
    candidate.decide()
}

#[derive(Debug, Default)]
struct TypeCandidate {
    non_empty: usize,
    numeric_misses: usize,
    temporal_misses: usize,
}

impl TypeCandidate {
    fn update(&mut self, value: &str) {
        self.non_empty += 1;
        if parse_number(value).is_none() {
            self.numeric_misses += 1;
            if parse_temporal(value).is_none() {
                self.temporal_misses += 1;
            }
        } else if parse_temporal(value).is_none() {
            self.temporal_misses += 1;
        }
    }

    fn settled(&self) -> bool {
        self.numeric_misses > 0 && self.temporal_misses > 0
    }

    fn decide(&self) -> ColumnType {
        if self.non_empty == 0 {
            ColumnType::String
        } else if self.numeric_misses == 0 {
            ColumnType::Numeric
        } else if self.temporal_misses == 0 {
            ColumnType::DateTime
        } else {
            ColumnType::String
        }
    }
}

/// Per-column summary reported by `probe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub column_type: ColumnType,
    pub non_null: usize,
    pub nulls: usize,
    pub distinct: usize,
    pub placeholder: bool,
}

pub fn profile_table(table: &Table) -> Vec<ColumnProfile> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let mut distinct = HashSet::new();
            let mut nulls = 0usize;
            for cell in table.column_cells(idx) {
                match cell {
                    Some(value) => {
                        distinct.insert(value);
                    }
                    None => nulls += 1,
                }
            }
            ColumnProfile {
                name: column.name.clone(),
                column_type: column.kind,
                non_null: table.row_count() - nulls,
                nulls,
                distinct: distinct.len(),
                placeholder: column.placeholder,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_resolve_to_numeric() {
        assert_eq!(infer_column_type(["1", "2", "3"]), ColumnType::Numeric);
        assert_eq!(infer_column_type(["1.5", "-2", "3e2"]), ColumnType::Numeric);
    }

    #[test]
    fn iso_dates_resolve_to_datetime() {
        assert_eq!(
            infer_column_type(["2024-01-01", "2024-02-15"]),
            ColumnType::DateTime
        );
        assert_eq!(
            infer_column_type(["2024-01-01 10:00:00", "2024-02-15"]),
            ColumnType::DateTime
        );
    }

    #[test]
    fn mixed_content_resolves_to_string() {
        assert_eq!(infer_column_type(["a", "b", "1"]), ColumnType::String);
        assert_eq!(
            infer_column_type(["2024-01-01", "12"]),
            ColumnType::String
        );
    }

    #[test]
    fn empty_column_is_string() {
        assert_eq!(infer_column_type(std::iter::empty()), ColumnType::String);
    }

    #[test]
    fn four_digit_years_stay_numeric() {
        assert_eq!(infer_column_type(["2023", "2024"]), ColumnType::Numeric);
    }

    #[test]
    fn column_type_parses_aliases() {
        assert_eq!("Date".parse::<ColumnType>().unwrap(), ColumnType::DateTime);
        assert_eq!("float".parse::<ColumnType>().unwrap(), ColumnType::Numeric);
        assert!("guid".parse::<ColumnType>().is_err());
    }
}
