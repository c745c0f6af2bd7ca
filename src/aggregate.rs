//! Group-by and reduction over a single table.
//!
//! Groups are keyed by the typed values of the group-by columns and emitted
//! in ascending key order: numbers numerically, dates chronologically, text
//! lexicographically, compared column by column. Datetime group columns are
//! collapsed to their calendar date first. Rows with a missing group cell do
//! not belong to any group.

use std::collections::{BTreeMap, HashSet};

use clap::ValueEnum;
use log::{debug, info};

use crate::{
    data::{Value, canonical_date, format_number, parse_number, parse_typed_value},
    error::AggregationError,
    schema::ColumnType,
    table::{Column, Row, Table},
};

pub const VALUE_COLUMN: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Reduction {
    Sum,
    Mean,
    Count,
    CountDistinct,
}

impl Reduction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reduction::Sum => "sum",
            Reduction::Mean => "mean",
            Reduction::Count => "count",
            Reduction::CountDistinct => "count-distinct",
        }
    }

    pub fn requires_numeric(&self) -> bool {
        matches!(self, Reduction::Sum | Reduction::Mean)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationSpec {
    pub group_by: Vec<String>,
    pub value_column: String,
    pub reduction: Reduction,
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    rows: usize,
    numeric_count: usize,
    sum: f64,
    distinct: HashSet<String>,
}

impl GroupAccumulator {
    fn ingest(&mut self, value: Option<&str>, reduction: Reduction) {
        self.rows += 1;
        let Some(raw) = value else {
            return;
        };
        match reduction {
            Reduction::Sum | Reduction::Mean => {
                if let Some(number) = parse_number(raw) {
                    self.sum += number;
                    self.numeric_count += 1;
                }
            }
            Reduction::CountDistinct => {
                if !self.distinct.contains(raw) {
                    self.distinct.insert(raw.to_string());
                }
            }
            Reduction::Count => {}
        }
    }

    fn finish(&self, reduction: Reduction) -> Option<String> {
        match reduction {
            Reduction::Sum => Some(format_number(self.sum)),
            Reduction::Mean => (self.numeric_count > 0)
                .then(|| format_number(self.sum / self.numeric_count as f64)),
            Reduction::Count => Some(self.rows.to_string()),
            Reduction::CountDistinct => Some(self.distinct.len().to_string()),
        }
    }
}

pub fn aggregate(table: &Table, spec: &AggregationSpec) -> Result<Table, AggregationError> {
    if spec.group_by.is_empty() {
        return Err(AggregationError::EmptyGroupBy);
    }
    let resolve = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| AggregationError::UnknownColumn {
                column: name.to_string(),
            })
    };
    let group_indices = spec
        .group_by
        .iter()
        .map(|name| resolve(name))
        .collect::<Result<Vec<_>, _>>()?;
    let value_index = resolve(&spec.value_column)?;
    let value_kind = table.columns()[value_index].kind;
    if spec.reduction.requires_numeric() && value_kind != ColumnType::Numeric {
        return Err(AggregationError::NonNumericValue {
            column: spec.value_column.clone(),
            column_type: value_kind.to_string(),
            reduction: spec.reduction.as_str(),
        });
    }

    let kinds: Vec<ColumnType> = group_indices
        .iter()
        .map(|idx| table.columns()[*idx].kind)
        .collect();
    let mut groups: BTreeMap<Vec<Value>, GroupAccumulator> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in table.rows() {
        let Some(key) = group_key(row, &group_indices, &kinds) else {
            skipped += 1;
            continue;
        };
        groups
            .entry(key)
            .or_default()
            .ingest(row[value_index].as_deref(), spec.reduction);
    }
    if skipped > 0 {
        debug!("Skipped {skipped} row(s) with a missing group-by value");
    }

    let mut columns: Vec<Column> = group_indices
        .iter()
        .map(|idx| {
            let source = &table.columns()[*idx];
            Column::new(source.name.clone(), source.kind)
        })
        .collect();
    columns.push(Column::new(
        value_column_name(&spec.group_by),
        ColumnType::Numeric,
    ));

    let rows: Vec<Row> = groups
        .iter()
        .map(|(key, acc)| {
            let mut row: Row = key.iter().map(|v| Some(v.as_display())).collect();
            row.push(acc.finish(spec.reduction));
            row
        })
        .collect();

    info!(
        "Aggregated {} row(s) into {} group(s) ({} of '{}')",
        table.row_count(),
        rows.len(),
        spec.reduction.as_str(),
        spec.value_column
    );
    Ok(Table::assemble(columns, rows))
}

fn group_key(row: &Row, indices: &[usize], kinds: &[ColumnType]) -> Option<Vec<Value>> {
    indices
        .iter()
        .zip(kinds)
        .map(|(idx, kind)| {
            let raw = row[*idx].as_deref()?;
            Some(match kind {
                ColumnType::DateTime => {
                    Value::String(canonical_date(raw).unwrap_or_else(|| raw.to_string()))
                }
                other => parse_typed_value(raw, *other),
            })
        })
        .collect()
}

fn value_column_name(group_by: &[String]) -> String {
    let mut candidate = VALUE_COLUMN.to_string();
    let mut counter = 0usize;
    while group_by.iter().any(|name| name == &candidate) {
        counter += 1;
        candidate = format!("{VALUE_COLUMN}_{counter}");
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadOptions, load_table};

    fn load(text: &str) -> Table {
        load_table(text.as_bytes(), &LoadOptions::default()).expect("load table")
    }

    fn spec(group_by: &[&str], value: &str, reduction: Reduction) -> AggregationSpec {
        AggregationSpec {
            group_by: group_by.iter().map(|s| s.to_string()).collect(),
            value_column: value.to_string(),
            reduction,
        }
    }

    fn pairs(table: &Table) -> Vec<(String, Option<String>)> {
        let last = table.column_count() - 1;
        table
            .rows()
            .iter()
            .map(|row| (row[0].clone().unwrap_or_default(), row[last].clone()))
            .collect()
    }

    #[test]
    fn numeric_groups_sort_numerically() {
        let table = load("k,v\n10,1\n9,2\n10,3\n");
        let result = aggregate(&table, &spec(&["k"], "v", Reduction::Sum)).unwrap();
        assert_eq!(
            pairs(&result),
            vec![
                ("9".to_string(), Some("2".to_string())),
                ("10".to_string(), Some("4".to_string()))
            ]
        );
    }

    #[test]
    fn mean_skips_missing_values() {
        let table = load("k,v\na,1\na,\na,4\nb,\n");
        let result = aggregate(&table, &spec(&["k"], "v", Reduction::Mean)).unwrap();
        assert_eq!(
            pairs(&result),
            vec![
                ("a".to_string(), Some("2.5".to_string())),
                ("b".to_string(), None)
            ]
        );
    }

    #[test]
    fn count_distinct_ignores_missing_values() {
        let table = load("k,v\na,x\na,x\na,y\na,\n");
        let result = aggregate(&table, &spec(&["k"], "v", Reduction::CountDistinct)).unwrap();
        assert_eq!(pairs(&result), vec![("a".to_string(), Some("2".to_string()))]);
        let counted = aggregate(&table, &spec(&["k"], "v", Reduction::Count)).unwrap();
        assert_eq!(pairs(&counted), vec![("a".to_string(), Some("4".to_string()))]);
    }

    #[test]
    fn datetime_groups_collapse_to_dates() {
        let table = load("at,v\n2024-01-01 09:00:00,1\n2024-01-01 17:30:00,2\n2024-01-02,5\n");
        let result = aggregate(&table, &spec(&["at"], "v", Reduction::Sum)).unwrap();
        assert_eq!(
            pairs(&result),
            vec![
                ("2024-01-01".to_string(), Some("3".to_string())),
                ("2024-01-02".to_string(), Some("5".to_string()))
            ]
        );
        assert_eq!(result.columns()[0].kind, ColumnType::DateTime);
    }

    #[test]
    fn missing_group_values_are_excluded() {
        let table = load("k,v\na,1\n,2\n");
        let result = aggregate(&table, &spec(&["k"], "v", Reduction::Count)).unwrap();
        assert_eq!(result.row_count(), 1);
    }

    #[test]
    fn rejects_bad_specs() {
        let table = load("k,v\na,x\n");
        assert!(matches!(
            aggregate(&table, &spec(&[], "v", Reduction::Count)),
            Err(AggregationError::EmptyGroupBy)
        ));
        assert!(matches!(
            aggregate(&table, &spec(&["k"], "v", Reduction::Sum)),
            Err(AggregationError::NonNumericValue { .. })
        ));
        assert!(matches!(
            aggregate(&table, &spec(&["nope"], "v", Reduction::Count)),
            Err(AggregationError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn value_column_name_avoids_group_names() {
        let table = load("value,v\na,1\n");
        let result = aggregate(&table, &spec(&["value"], "v", Reduction::Sum)).unwrap();
        assert_eq!(result.headers(), vec!["value", "value_1"]);
    }
}
