//! Error taxonomy for the core transformation engine.
//!
//! Every core operation returns one of these typed errors so the caller can
//! report the offending file, column, or operation and keep its last valid
//! state. The CLI layer wraps them in `anyhow` with additional context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to decode input as {encoding}")]
    Decode { encoding: &'static str },
    #[error("Malformed record on line {line}: {message}")]
    Malformed { line: u64, message: String },
    #[error("Row {line} has {found} field(s) but the header defines {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("No header row available to promote")]
    NoHeaderRow,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Merge requires at least {required} valid source(s) but only {valid} remain")]
    InsufficientSources { valid: usize, required: usize },
    #[error("No join key selected for source '{source_name}'")]
    NoJoinKey { source_name: String },
    #[error("Expected {expected} join key(s) (one per source) but received {found}")]
    KeyCountMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Column '{column}' not found for filter")]
    UnknownColumn { column: String },
    #[error("Filter value '{value}' for column '{column}' is not a number")]
    InvalidNumber { column: String, value: String },
    #[error("Filter value '{value}' for column '{column}' is not a date")]
    InvalidDate { column: String, value: String },
    #[error("Date range for column '{column}' starts after it ends ({start} > {end})")]
    InvalidRange {
        column: String,
        start: String,
        end: String,
    },
    #[error("Column '{column}' is {column_type}; {operand} filters do not apply")]
    OperandMismatch {
        column: String,
        column_type: String,
        operand: &'static str,
    },
    #[error("No values selected for column '{column}'")]
    EmptySelection { column: String },
    #[error("Unknown comparison operator '{0}'")]
    UnknownOperator(String),
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Select at least one group-by column")]
    EmptyGroupBy,
    #[error("Column '{column}' not found for aggregation")]
    UnknownColumn { column: String },
    #[error("Cannot compute {reduction} over column '{column}' of type {column_type}")]
    NonNumericValue {
        column: String,
        column_type: String,
        reduction: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Column '{column}' not found for chart")]
    UnknownColumn { column: String },
    #[error("Column '{column}' must be numeric to serve as the {role} of a {kind} chart")]
    NonNumeric {
        column: String,
        role: &'static str,
        kind: &'static str,
    },
    #[error("Table has no numeric column to plot")]
    NoNumericColumn,
    #[error("Table has no column available for the {role} axis")]
    MissingAxis { role: &'static str },
    #[error("Table has no columns to plot")]
    EmptyTable,
}

/// Failure of a session operation: either there is nothing to operate on, or
/// the underlying core operation failed.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No table loaded; load or merge files first")]
    NoCurrentTable,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Export(#[from] anyhow::Error),
}
