use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    aggregate::Reduction,
    chart::ChartKind,
    filter::LogicalOperator,
    merge::{CollisionPolicy, JoinKind},
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Merge, filter, aggregate and chart CSV files",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report the inferred type and null/distinct counts of every column
    Probe(ProbeArgs),
    /// Preview the first few rows of a CSV file in a formatted table
    Preview(PreviewArgs),
    /// Join two or more CSV files on a key column
    Merge(MergeArgs),
    /// Stack CSV files vertically over the union of their columns
    Append(AppendArgs),
    /// Keep the rows matching one or more typed filter expressions
    Filter(FilterArgs),
    /// Group rows and reduce a value column per group
    Aggregate(AggregateArgs),
    /// Emit a declarative chart spec for a table
    Chart(ChartArgs),
}

/// Options shared by every command that reads CSV input.
#[derive(Debug, Clone, Args)]
pub struct ReadArgs {
    /// CSV delimiter character (supports ',', 'tab', ';', '|'; detected when omitted)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Treat the first line as data and name columns column_1, column_2, ...
    #[arg(long = "no-header")]
    pub no_header: bool,
}

/// Destination options for commands producing a table.
#[derive(Debug, Clone, Args)]
pub struct WriteArgs {
    /// Output CSV file (stdout if omitted; `.csv` is appended when there is no extension)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Render output as an aligned table to stdout instead of CSV
    #[arg(long = "table")]
    pub table: bool,
}

/// Row filters applied before the command's main operation.
#[derive(Debug, Clone, Args)]
pub struct WhereArgs {
    /// Filter expressions such as `status=shipped,pending`, `amount>=100`,
    /// `ordered_at=2024-01-01..2024-01-31` or `id in other.csv:customer_id`
    #[arg(long = "where", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// How multiple filters combine
    #[arg(long, value_enum, default_value_t = LogicalOperator::And)]
    pub logic: LogicalOperator,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV file to inspect (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Rename columns from the first data row after loading
    #[arg(long = "promote-header")]
    pub promote_header: bool,
    #[command(flatten)]
    pub read: ReadArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input CSV file to preview (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to display (0 shows every row)
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    #[command(flatten)]
    pub read: ReadArgs,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Two or more CSV files to merge, in join order
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Join key column; give once for all files or once per file
    #[arg(short = 'k', long = "key", required = true, action = clap::ArgAction::Append)]
    pub keys: Vec<String>,
    /// Join kind
    #[arg(long = "type", value_enum, default_value_t = JoinKind::Outer)]
    pub kind: JoinKind,
    /// Which source wins when non-key columns share a name
    #[arg(long, value_enum, default_value_t = CollisionPolicy::KeepFirst)]
    pub collisions: CollisionPolicy,
    #[command(flatten)]
    pub read: ReadArgs,
    #[command(flatten)]
    pub write: WriteArgs,
}

#[derive(Debug, Args)]
pub struct AppendArgs {
    /// One or more CSV files to append
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    #[command(flatten)]
    pub read: ReadArgs,
    #[command(flatten)]
    pub write: WriteArgs,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Input CSV file to filter (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub filters: WhereArgs,
    #[command(flatten)]
    pub read: ReadArgs,
    #[command(flatten)]
    pub write: WriteArgs,
}

/// Group-by selection shared by `aggregate` and `chart`.
#[derive(Debug, Clone, Args)]
pub struct GroupArgs {
    /// Columns to group by, in order
    #[arg(short = 'g', long = "group-by", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub group_by: Vec<String>,
    /// Column the reduction is computed over
    #[arg(long = "value")]
    pub value: Option<String>,
    /// Reduction applied per group
    #[arg(long = "reduce", value_enum, default_value_t = Reduction::Sum)]
    pub reduce: Reduction,
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    /// Input CSV file to aggregate (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    #[command(flatten)]
    pub group: GroupArgs,
    #[command(flatten)]
    pub filters: WhereArgs,
    #[command(flatten)]
    pub read: ReadArgs,
    #[command(flatten)]
    pub write: WriteArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "lowercase")]
pub enum SpecFormat {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Args)]
pub struct ChartArgs {
    /// Input CSV file to chart (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Chart kind
    #[arg(long, value_enum)]
    pub kind: ChartKind,
    /// Column for the x axis (pie: slice names; histogram: the binned column)
    #[arg(long)]
    pub x: Option<String>,
    /// Column for the y axis (pie: slice values)
    #[arg(long)]
    pub y: Option<String>,
    /// Column distinguishing series in bar and line charts
    #[arg(long)]
    pub color: Option<String>,
    /// Serialization of the chart document
    #[arg(long, value_enum, default_value_t = SpecFormat::Json)]
    pub format: SpecFormat,
    /// Output file for the chart document (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub group: GroupArgs,
    #[command(flatten)]
    pub filters: WhereArgs,
    #[command(flatten)]
    pub read: ReadArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "pipe" | "|" => Ok(b'|'),
        "semicolon" | ";" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
