//! Typed filter predicates and their composition.
//!
//! A [`Predicate`] is a pure description of a row test. Leaf predicates are
//! built from a column, its inferred [`ColumnType`], and an operand whose
//! shape depends on that type; composites combine leaves under a single
//! [`LogicalOperator`]. Evaluation produces a row mask, and
//! [`filter_table`] keeps the matching rows in their original order.
//!
//! Malformed operands are rejected while building the predicate. Nothing in
//! this module falls back to "match everything" or "match nothing".

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::NaiveDate;
use clap::ValueEnum;
use itertools::Itertools;
use log::debug;

use crate::{
    data::{parse_number, parse_temporal},
    error::FilterError,
    schema::ColumnType,
    table::Table,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Ge => ">=",
        }
    }

    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            ComparisonOperator::Eq => lhs == rhs,
            ComparisonOperator::Lt => lhs < rhs,
            ComparisonOperator::Gt => lhs > rhs,
            ComparisonOperator::Le => lhs <= rhs,
            ComparisonOperator::Ge => lhs >= rhs,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "=" | "==" => Ok(ComparisonOperator::Eq),
            "<" => Ok(ComparisonOperator::Lt),
            ">" => Ok(ComparisonOperator::Gt),
            "<=" => Ok(ComparisonOperator::Le),
            ">=" => Ok(ComparisonOperator::Ge),
            other => Err(FilterError::UnknownOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// User-supplied operand for a single-column filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOperand {
    /// Selected literal values (string columns).
    Values(Vec<String>),
    /// Comma-separated literal list typed by hand (string columns).
    Manual(String),
    /// Comparison against a number (numeric columns).
    Compare {
        operator: ComparisonOperator,
        value: String,
    },
    /// Inclusive calendar date range (datetime columns).
    DateRange { start: String, end: String },
    /// Values taken from a column of another table (any column type).
    MemberOf {
        source: String,
        values: BTreeSet<String>,
    },
}

impl FilterOperand {
    fn label(&self) -> &'static str {
        match self {
            FilterOperand::Values(_) | FilterOperand::Manual(_) => "value selection",
            FilterOperand::Compare { .. } => "numeric comparison",
            FilterOperand::DateRange { .. } => "date range",
            FilterOperand::MemberOf { .. } => "membership",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equality {
        column: String,
        values: BTreeSet<String>,
    },
    Range {
        column: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    Comparison {
        column: String,
        operator: ComparisonOperator,
        value: f64,
    },
    Membership {
        column: String,
        source: String,
        values: BTreeSet<String>,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    /// Keeps rows whose `column` text appears in `source_column` of `source`.
    pub fn membership(
        column: &str,
        source: &Table,
        source_column: &str,
    ) -> Result<Predicate, FilterError> {
        let idx = source
            .column_index(source_column)
            .ok_or_else(|| FilterError::UnknownColumn {
                column: source_column.to_string(),
            })?;
        Ok(Predicate::Membership {
            column: column.to_string(),
            source: source_column.to_string(),
            values: source.column_values(idx).map(str::to_string).collect(),
        })
    }

    /// Row mask: `true` for every row the predicate accepts.
    pub fn evaluate(&self, table: &Table) -> Result<Vec<bool>, FilterError> {
        match self {
            Predicate::All(children) => {
                let mut mask = vec![true; table.row_count()];
                for child in children {
                    for (slot, hit) in mask.iter_mut().zip(child.evaluate(table)?) {
                        *slot &= hit;
                    }
                }
                Ok(mask)
            }
            Predicate::Any(children) => {
                let mut mask = vec![false; table.row_count()];
                for child in children {
                    for (slot, hit) in mask.iter_mut().zip(child.evaluate(table)?) {
                        *slot |= hit;
                    }
                }
                Ok(mask)
            }
            Predicate::Equality { column, values } | Predicate::Membership { column, values, .. } => {
                let idx = resolve_column(table, column)?;
                Ok(table
                    .column_cells(idx)
                    .map(|cell| cell.is_some_and(|text| values.contains(text)))
                    .collect())
            }
            Predicate::Comparison {
                column,
                operator,
                value,
            } => {
                let idx = resolve_column(table, column)?;
                Ok(table
                    .column_cells(idx)
                    .map(|cell| {
                        cell.and_then(parse_number)
                            .is_some_and(|number| operator.apply(number, *value))
                    })
                    .collect())
            }
            Predicate::Range { column, start, end } => {
                let idx = resolve_column(table, column)?;
                Ok(table
                    .column_cells(idx)
                    .map(|cell| {
                        cell.and_then(parse_temporal)
                            .is_some_and(|dt| (*start..=*end).contains(&dt.date()))
                    })
                    .collect())
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equality { column, values } => {
                write!(f, "{column} in {{{}}}", values.iter().join(", "))
            }
            Predicate::Range { column, start, end } => {
                write!(f, "{column} between {start} and {end}")
            }
            Predicate::Comparison {
                column,
                operator,
                value,
            } => write!(f, "{column} {} {value}", operator.symbol()),
            Predicate::Membership {
                column,
                source,
                values,
            } => write!(f, "{column} in {source} ({} value(s))", values.len()),
            Predicate::All(children) => write!(f, "({})", children.iter().join(" AND ")),
            Predicate::Any(children) => write!(f, "({})", children.iter().join(" OR ")),
        }
    }
}

fn resolve_column(table: &Table, column: &str) -> Result<usize, FilterError> {
    table
        .column_index(column)
        .ok_or_else(|| FilterError::UnknownColumn {
            column: column.to_string(),
        })
}

/// Builds a single-column predicate for a column of the given type.
pub fn build_predicate(
    column: &str,
    column_type: ColumnType,
    operand: FilterOperand,
) -> Result<Predicate, FilterError> {
    let column_name = column.to_string();
    match (column_type, operand) {
        (_, FilterOperand::MemberOf { source, values }) => Ok(Predicate::Membership {
            column: column_name,
            source,
            values,
        }),
        (ColumnType::String, FilterOperand::Values(values)) => {
            selection_predicate(column_name, values.iter().map(String::as_str))
        }
        (ColumnType::String, FilterOperand::Manual(text)) => {
            selection_predicate(column_name, text.split(','))
        }
        (ColumnType::Numeric, FilterOperand::Compare { operator, value }) => {
            let number = parse_number(&value).ok_or_else(|| FilterError::InvalidNumber {
                column: column_name.clone(),
                value: value.clone(),
            })?;
            Ok(Predicate::Comparison {
                column: column_name,
                operator,
                value: number,
            })
        }
        (ColumnType::DateTime, FilterOperand::DateRange { start, end }) => {
            let parse_bound = |raw: &str| {
                parse_temporal(raw)
                    .map(|dt| dt.date())
                    .ok_or_else(|| FilterError::InvalidDate {
                        column: column_name.clone(),
                        value: raw.to_string(),
                    })
            };
            let start_date = parse_bound(&start)?;
            let end_date = parse_bound(&end)?;
            if start_date > end_date {
                return Err(FilterError::InvalidRange {
                    column: column_name,
                    start,
                    end,
                });
            }
            Ok(Predicate::Range {
                column: column_name,
                start: start_date,
                end: end_date,
            })
        }
        (column_type, operand) => Err(FilterError::OperandMismatch {
            column: column_name,
            column_type: column_type.to_string(),
            operand: operand.label(),
        }),
    }
}

fn selection_predicate<'a, I>(column: String, values: I) -> Result<Predicate, FilterError>
where
    I: IntoIterator<Item = &'a str>,
{
    let values: BTreeSet<String> = values
        .into_iter()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Err(FilterError::EmptySelection { column });
    }
    Ok(Predicate::Equality { column, values })
}

/// Combines predicates under one logical operator. An empty list is the
/// identity filter and keeps every row.
pub fn compose(predicates: Vec<Predicate>, logic: LogicalOperator) -> Predicate {
    if predicates.is_empty() {
        return Predicate::All(Vec::new());
    }
    match logic {
        LogicalOperator::And => Predicate::All(predicates),
        LogicalOperator::Or => Predicate::Any(predicates),
    }
}

pub fn filter_table(table: &Table, predicate: &Predicate) -> Result<Table, FilterError> {
    let mask = predicate.evaluate(table)?;
    let indices: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, keep)| **keep)
        .map(|(idx, _)| idx)
        .collect();
    debug!(
        "Filter {predicate} kept {} of {} row(s)",
        indices.len(),
        table.row_count()
    );
    Ok(table.select_rows(&indices))
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub operand: FilterOperand,
}

/// A complete filter request: every condition joined by one operator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterRequest {
    pub conditions: Vec<FilterCondition>,
    pub logic: LogicalOperator,
}

impl FilterRequest {
    /// Builds the composed predicate using the table's inferred types.
    pub fn predicate(&self, table: &Table) -> Result<Predicate, FilterError> {
        let predicates = self
            .conditions
            .iter()
            .map(|condition| {
                let column = table.column(&condition.column).ok_or_else(|| {
                    FilterError::UnknownColumn {
                        column: condition.column.clone(),
                    }
                })?;
                build_predicate(&column.name, column.kind, condition.operand.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(compose(predicates, self.logic))
    }

    pub fn apply(&self, table: &Table) -> Result<Table, FilterError> {
        let predicate = self.predicate(table)?;
        filter_table(table, &predicate)
    }
}

/// Distinct non-null values of a column, sorted, for value pickers.
pub fn unique_values(table: &Table, column: &str) -> Result<Vec<String>, FilterError> {
    let idx = resolve_column(table, column)?;
    let values: BTreeSet<&str> = table.column_values(idx).collect();
    Ok(values.into_iter().map(str::to_string).collect())
}

/// Operator parsed from a textual filter expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionOperator {
    Compare(ComparisonOperator),
    In,
}

/// Textual filter such as `amount>=100`, `status=shipped,pending`,
/// `ordered_at=2024-01-01..2024-01-31`, or `id in other.csv:customer_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpression {
    pub column: String,
    pub operator: ExpressionOperator,
    pub raw_value: String,
}

impl FromStr for FilterExpression {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if let Some(idx) = lowered.find(" in ") {
            let column = trimmed[..idx].trim();
            let raw = trimmed[idx + 4..].trim();
            if !column.is_empty() && !raw.is_empty() && !column.contains(['<', '>', '=']) {
                return Ok(FilterExpression {
                    column: column.to_string(),
                    operator: ExpressionOperator::In,
                    raw_value: unquote(raw).to_string(),
                });
            }
        }

        let malformed = || FilterError::UnknownOperator(trimmed.to_string());
        let idx = trimmed
            .find(['<', '>', '='])
            .ok_or_else(malformed)?;
        let rest = &trimmed[idx..];
        let symbol_len = if rest.starts_with("<=") || rest.starts_with(">=") || rest.starts_with("==")
        {
            2
        } else {
            1
        };
        let operator: ComparisonOperator = rest[..symbol_len].parse()?;
        let column = trimmed[..idx].trim();
        if column.is_empty() {
            return Err(malformed());
        }
        Ok(FilterExpression {
            column: column.to_string(),
            operator: ExpressionOperator::Compare(operator),
            raw_value: unquote(rest[symbol_len..].trim()).to_string(),
        })
    }
}

impl FilterExpression {
    /// Translates the expression into the operand shape the column type
    /// expects. Membership expressions are resolved by the caller, which owns
    /// the second table.
    pub fn into_operand(self, column_type: ColumnType) -> Result<FilterOperand, FilterError> {
        let mismatch = |operand: &'static str| FilterError::OperandMismatch {
            column: self.column.clone(),
            column_type: column_type.to_string(),
            operand,
        };
        match (self.operator, column_type) {
            (ExpressionOperator::In, _) => Err(mismatch("membership")),
            (ExpressionOperator::Compare(operator), ColumnType::Numeric) => {
                Ok(FilterOperand::Compare {
                    operator,
                    value: self.raw_value,
                })
            }
            (ExpressionOperator::Compare(ComparisonOperator::Eq), ColumnType::String) => {
                Ok(FilterOperand::Manual(self.raw_value))
            }
            (ExpressionOperator::Compare(ComparisonOperator::Eq), ColumnType::DateTime) => {
                let (start, end) = match self.raw_value.split_once("..") {
                    Some((start, end)) => (start.trim().to_string(), end.trim().to_string()),
                    None => (self.raw_value.clone(), self.raw_value.clone()),
                };
                Ok(FilterOperand::DateRange { start, end })
            }
            (ExpressionOperator::Compare(_), _) => Err(mismatch("ordering comparison")),
        }
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}
