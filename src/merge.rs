//! Multi-table merge on per-source join keys.
//!
//! Sources are folded left to right: the accumulated result is joined with
//! the next source on text equality of the key cells. Key cells are compared
//! exactly as loaded, so `5` and `5.0` are different keys; callers that want
//! them equal must normalize the text first. Missing keys match each other.

use std::{collections::HashMap, fmt};

use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    error::MergeError,
    table::{Column, Row, Table},
};

const KEY_NAME_SEPARATOR: &str = "/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum JoinKind {
    #[default]
    Outer,
    Inner,
}

/// Resolution for non-key columns that share a name across sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// The earlier source's column wins and the later one is dropped.
    #[default]
    KeepFirst,
    /// On matched rows the later source's values replace the earlier ones.
    /// Rows the later source does not reach keep their earlier values.
    KeepLast,
}

#[derive(Debug, Clone, Copy)]
pub struct MergeSource<'a> {
    pub name: &'a str,
    pub table: &'a Table,
    pub key: &'a str,
}

#[derive(Debug, Clone)]
pub struct MergeSpec<'a> {
    pub sources: Vec<MergeSource<'a>>,
    pub kind: JoinKind,
    pub collisions: CollisionPolicy,
}

impl<'a> MergeSpec<'a> {
    /// Pairs each named table with its key. A single key applies to every
    /// source; otherwise one key per source is required.
    pub fn with_keys(
        tables: &[(&'a str, &'a Table)],
        keys: &'a [String],
        kind: JoinKind,
        collisions: CollisionPolicy,
    ) -> Result<Self, MergeError> {
        let keys: Vec<&str> = match keys.len() {
            0 => {
                return Err(MergeError::NoJoinKey {
                    source_name: tables
                        .first()
                        .map(|(name, _)| (*name).to_string())
                        .unwrap_or_default(),
                });
            }
            1 => vec![keys[0].as_str(); tables.len()],
            n if n == tables.len() => keys.iter().map(String::as_str).collect(),
            found => {
                return Err(MergeError::KeyCountMismatch {
                    expected: tables.len(),
                    found,
                });
            }
        };
        let sources = tables
            .iter()
            .zip(keys)
            .map(|(&(name, table), key)| MergeSource { name, table, key })
            .collect();
        Ok(Self {
            sources,
            kind,
            collisions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeWarning {
    MissingKey { source_name: String, key: String },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::MissingKey { source_name, key } => write!(
                f,
                "Skipping '{source_name}': join key column '{key}' not found"
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: Table,
    pub warnings: Vec<MergeWarning>,
}

pub fn merge_tables(spec: &MergeSpec<'_>) -> Result<MergeOutcome, MergeError> {
    if spec.sources.len() < 2 {
        return Err(MergeError::InsufficientSources {
            valid: spec.sources.len(),
            required: 2,
        });
    }
    if let Some(source) = spec.sources.iter().find(|s| s.key.trim().is_empty()) {
        return Err(MergeError::NoJoinKey {
            source_name: source.name.to_string(),
        });
    }

    let mut warnings = Vec::new();
    let mut valid = Vec::with_capacity(spec.sources.len());
    for source in &spec.sources {
        let key = source.key.trim();
        match source.table.column_index(key) {
            Some(idx) => valid.push((source, idx)),
            None => {
                let warning = MergeWarning::MissingKey {
                    source_name: source.name.to_string(),
                    key: key.to_string(),
                };
                warn!("{warning}");
                warnings.push(warning);
            }
        }
    }
    if valid.len() < 2 {
        return Err(MergeError::InsufficientSources {
            valid: valid.len(),
            required: 2,
        });
    }

    let key_name = valid
        .iter()
        .map(|(source, _)| source.key.trim())
        .unique()
        .join(KEY_NAME_SEPARATOR);
    debug!(
        "Merging {} source(s) on '{}' ({:?}, {:?})",
        valid.len(),
        key_name,
        spec.kind,
        spec.collisions
    );

    let (first, first_key) = valid[0];
    let (mut columns, rows) = first.table.clone().into_parts();
    columns[first_key].name = key_name;
    columns[first_key].placeholder = false;
    let mut left = Table::assemble(columns, rows);

    for (source, right_key) in &valid[1..] {
        left = join_pair(
            &left,
            first_key,
            source.table,
            *right_key,
            spec.kind,
            spec.collisions,
        );
        debug!(
            "Joined '{}': {} row(s) accumulated",
            source.name,
            left.row_count()
        );
    }

    let table = left.retain_columns(|c| !c.placeholder).infer_types();
    info!(
        "Merge complete: {} row(s), {} column(s) from {} source(s)",
        table.row_count(),
        table.column_count(),
        valid.len()
    );
    Ok(MergeOutcome { table, warnings })
}

/// Where a right-hand column lands in the joined output.
enum Placement {
    Append,
    Replace(usize),
}

fn join_pair(
    left: &Table,
    left_key: usize,
    right: &Table,
    right_key: usize,
    kind: JoinKind,
    collisions: CollisionPolicy,
) -> Table {
    let mut columns = left.columns().to_vec();
    let mut plan: Vec<(usize, Placement)> = Vec::new();
    for (idx, column) in right.columns().iter().enumerate() {
        if idx == right_key {
            continue;
        }
        match left.column_index(&column.name) {
            Some(existing) if existing == left_key => {}
            Some(existing) => {
                if collisions == CollisionPolicy::KeepLast {
                    plan.push((idx, Placement::Replace(existing)));
                }
            }
            None => {
                columns.push(column.clone());
                plan.push((idx, Placement::Append));
            }
        }
    }

    let mut lookup: HashMap<Option<&str>, Vec<usize>> = HashMap::new();
    for (idx, row) in right.rows().iter().enumerate() {
        lookup.entry(row[right_key].as_deref()).or_default().push(idx);
    }
    let mut matched = vec![false; right.row_count()];

    let combine = |base: &Row, right_row: Option<&Row>| -> Row {
        let mut combined = base.clone();
        for (idx, placement) in &plan {
            let value = right_row.and_then(|r| r[*idx].clone());
            match placement {
                Placement::Append => combined.push(value),
                Placement::Replace(target) => {
                    if right_row.is_some() {
                        combined[*target] = value;
                    }
                }
            }
        }
        combined
    };

    let mut rows: Vec<Row> = Vec::new();
    for row in left.rows() {
        match lookup.get(&row[left_key].as_deref()) {
            Some(bucket) => {
                for right_idx in bucket {
                    matched[*right_idx] = true;
                    rows.push(combine(row, Some(&right.rows()[*right_idx])));
                }
            }
            None => {
                if kind == JoinKind::Outer {
                    rows.push(combine(row, None));
                }
            }
        }
    }

    if kind == JoinKind::Outer {
        let blank: Row = vec![None; left.column_count()];
        for (idx, right_row) in right.rows().iter().enumerate() {
            if matched[idx] {
                continue;
            }
            let mut base = blank.clone();
            base[left_key] = right_row[right_key].clone();
            rows.push(combine(&base, Some(right_row)));
        }
    }

    Table::assemble(columns, rows)
}

/// Column names present in every table, in the first table's order.
pub fn suggest_join_keys(tables: &[&Table]) -> Vec<String> {
    let Some((first, rest)) = tables.split_first() else {
        return Vec::new();
    };
    first
        .columns()
        .iter()
        .filter(|c| !c.placeholder)
        .filter(|c| rest.iter().all(|t| t.column_index(&c.name).is_some()))
        .map(|c: &Column| c.name.clone())
        .collect()
}
