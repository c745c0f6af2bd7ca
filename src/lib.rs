pub mod aggregate;
pub mod append;
pub mod chart;
pub mod cli;
pub mod data;
pub mod error;
pub mod export;
pub mod filter;
pub mod io_utils;
pub mod loader;
pub mod merge;
pub mod preview;
pub mod schema;
pub mod session;
pub mod table;

use std::{env, io::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    aggregate::{AggregationSpec, Reduction},
    chart::AxisSelection,
    cli::{Cli, Commands, GroupArgs, ReadArgs, SpecFormat, WhereArgs, WriteArgs},
    filter::{ExpressionOperator, FilterCondition, FilterExpression, FilterOperand, FilterRequest},
    loader::{LoadOptions, load_table, promote_first_row},
    session::{MergeRequest, Session},
    table::Table,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_blend", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Probe(args) => handle_probe(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Merge(args) => handle_merge(&args),
        Commands::Append(args) => handle_append(&args),
        Commands::Filter(args) => handle_filter(&args),
        Commands::Aggregate(args) => handle_aggregate(&args),
        Commands::Chart(args) => handle_chart(&args),
    }
}

fn load_options(read: &ReadArgs) -> Result<LoadOptions> {
    Ok(LoadOptions {
        delimiter: read.delimiter,
        encoding: io_utils::resolve_encoding(read.input_encoding.as_deref())?,
        has_headers: !read.no_header,
    })
}

fn read_table(path: &Path, options: &LoadOptions) -> Result<Table> {
    let bytes = io_utils::read_input(path)?;
    load_table(&bytes, options).with_context(|| format!("Parsing {path:?}"))
}

fn load_sources(session: &mut Session, inputs: &[&Path], options: &LoadOptions) -> Result<()> {
    for path in inputs {
        let bytes = io_utils::read_input(path)?;
        session
            .load_source(io_utils::display_name(path), &bytes, options)
            .with_context(|| format!("Parsing {path:?}"))?;
    }
    Ok(())
}

fn current_table(session: &Session) -> Result<&Table> {
    session
        .current()
        .ok_or_else(|| anyhow!("No table loaded"))
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    info!(
        "Probing '{}' with delimiter '{}'",
        args.input.display(),
        args.read
            .delimiter
            .map(printable_delimiter)
            .unwrap_or_else(|| "auto".to_string())
    );
    let mut table = read_table(&args.input, &options)?;
    if args.promote_header {
        table = promote_first_row(&table)
            .with_context(|| format!("Promoting header row of {:?}", args.input))?;
    }
    let profiles = schema::profile_table(&table);
    let headers = ["column", "type", "non_null", "nulls", "distinct"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let rows = profiles
        .iter()
        .map(|profile| {
            let name = if profile.placeholder {
                format!("{} (placeholder)", profile.name)
            } else {
                profile.name.clone()
            };
            vec![
                name,
                profile.column_type.to_string(),
                profile.non_null.to_string(),
                profile.nulls.to_string(),
                profile.distinct.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    preview::print_table(&headers, &rows);
    info!(
        "Profiled {} column(s) across {} row(s)",
        profiles.len(),
        table.row_count()
    );
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let table = read_table(&args.input, &options)?;
    print!("{}", preview::render_preview(&table, args.rows));
    let shown = match args.rows {
        0 => table.row_count(),
        limit => table.row_count().min(limit),
    };
    info!(
        "Displayed {} of {} row(s) from {:?}",
        shown,
        table.row_count(),
        args.input
    );
    Ok(())
}

fn handle_merge(args: &cli::MergeArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let mut session = Session::new();
    let inputs = args.inputs.iter().map(|p| p.as_path()).collect::<Vec<_>>();
    load_sources(&mut session, &inputs, &options)?;
    let request = MergeRequest {
        keys: args.keys.clone(),
        kind: args.kind,
        collisions: args.collisions,
    };
    let warnings = session
        .merge(&request)
        .with_context(|| format!("Merging {} file(s)", inputs.len()))?;
    let table = current_table(&session)?;
    info!(
        "Merged {} of {} file(s) into {} row(s) and {} column(s)",
        inputs.len() - warnings.len(),
        inputs.len(),
        table.row_count(),
        table.column_count()
    );
    write_table(table, &args.write)
}

fn handle_append(args: &cli::AppendArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let mut session = Session::new();
    let inputs = args.inputs.iter().map(|p| p.as_path()).collect::<Vec<_>>();
    load_sources(&mut session, &inputs, &options)?;
    let table = session
        .append()
        .with_context(|| format!("Appending {} file(s)", inputs.len()))?;
    info!(
        "Appended {} file(s) into {} row(s) and {} column(s)",
        inputs.len(),
        table.row_count(),
        table.column_count()
    );
    write_table(table, &args.write)
}

fn handle_filter(args: &cli::FilterArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let mut session = Session::new();
    load_sources(&mut session, &[args.input.as_path()], &options)?;
    apply_filters(&mut session, &args.filters, &options)?;
    write_table(current_table(&session)?, &args.write)
}

fn handle_aggregate(args: &cli::AggregateArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let mut session = Session::new();
    load_sources(&mut session, &[args.input.as_path()], &options)?;
    apply_filters(&mut session, &args.filters, &options)?;
    apply_grouping(&mut session, &args.group)?;
    write_table(current_table(&session)?, &args.write)
}

fn handle_chart(args: &cli::ChartArgs) -> Result<()> {
    let options = load_options(&args.read)?;
    let mut session = Session::new();
    load_sources(&mut session, &[args.input.as_path()], &options)?;
    apply_filters(&mut session, &args.filters, &options)?;
    if !args.group.group_by.is_empty() {
        apply_grouping(&mut session, &args.group)?;
    }
    let selection = AxisSelection {
        x: args.x.clone(),
        y: args.y.clone(),
        color: args.color.clone(),
    };
    let document = session
        .chart(args.kind, &selection)
        .with_context(|| format!("Mapping {} chart", args.kind.as_str()))?;
    let rendered = match args.format {
        SpecFormat::Json => document.to_json()?,
        SpecFormat::Yaml => document.to_yaml()?,
    };
    let mut writer = io_utils::open_output(args.output.as_deref())?;
    writer
        .write_all(rendered.as_bytes())
        .context("Writing chart document")?;
    if !rendered.ends_with('\n') {
        writer.write_all(b"\n").context("Writing chart document")?;
    }
    writer.flush().context("Flushing chart document")?;
    info!(
        "Mapped {} chart over {:?} with {} record(s)",
        args.kind.as_str(),
        document.spec.fields(),
        document.data.len()
    );
    Ok(())
}

fn apply_grouping(session: &mut Session, group: &GroupArgs) -> Result<()> {
    let value_column = match (&group.value, group.reduce) {
        (Some(value), _) => value.clone(),
        (None, Reduction::Count) => group.group_by.first().cloned().unwrap_or_default(),
        (None, reduction) => bail!("--value is required for {}", reduction.as_str()),
    };
    let spec = AggregationSpec {
        group_by: group.group_by.clone(),
        value_column,
        reduction: group.reduce,
    };
    let table = session
        .aggregate(&spec)
        .with_context(|| format!("Aggregating by {}", spec.group_by.join(", ")))?;
    info!(
        "Aggregated {} of '{}' into {} group(s)",
        spec.reduction.as_str(),
        spec.value_column,
        table.row_count()
    );
    Ok(())
}

fn apply_filters(session: &mut Session, filters: &WhereArgs, options: &LoadOptions) -> Result<()> {
    if filters.filters.is_empty() {
        return Ok(());
    }
    let request = {
        let table = current_table(session)?;
        resolve_filters(table, filters, options)?
    };
    let before = current_table(session)?.row_count();
    let table = session.apply_filter(&request).context("Applying filters")?;
    info!(
        "Filtered {} row(s) down to {} with {} condition(s)",
        before,
        table.row_count(),
        request.conditions.len()
    );
    Ok(())
}

/// Parses `--where` expressions against the column types of `table`.
/// Membership expressions (`col in FILE:column`) load the referenced file.
fn resolve_filters(table: &Table, filters: &WhereArgs, options: &LoadOptions) -> Result<FilterRequest> {
    let mut conditions = Vec::with_capacity(filters.filters.len());
    for raw in &filters.filters {
        let expression: FilterExpression = raw
            .parse()
            .with_context(|| format!("Parsing filter expression '{raw}'"))?;
        let column_type = table
            .column(&expression.column)
            .map(|c| c.kind)
            .ok_or_else(|| anyhow!("Filter column '{}' not found", expression.column))?;
        let column = expression.column.clone();
        let operand = match expression.operator {
            ExpressionOperator::In => membership_operand(&expression.raw_value, options)?,
            ExpressionOperator::Compare(_) => expression
                .into_operand(column_type)
                .with_context(|| format!("Interpreting filter expression '{raw}'"))?,
        };
        debug!("Filter on '{column}' ({column_type}): {operand:?}");
        conditions.push(FilterCondition { column, operand });
    }
    Ok(FilterRequest {
        conditions,
        logic: filters.logic,
    })
}

fn membership_operand(reference: &str, options: &LoadOptions) -> Result<FilterOperand> {
    let (path, column) = reference
        .rsplit_once(':')
        .filter(|(path, column)| !path.is_empty() && !column.is_empty())
        .ok_or_else(|| anyhow!("Membership filters take the form 'column in FILE:column'"))?;
    let other = read_table(Path::new(path), options)?;
    let idx = other
        .column_index(column)
        .ok_or_else(|| anyhow!("Column '{column}' not found in {path:?}"))?;
    Ok(FilterOperand::MemberOf {
        source: reference.to_string(),
        values: other.column_values(idx).map(str::to_string).collect(),
    })
}

fn write_table(table: &Table, write: &WriteArgs) -> Result<()> {
    if write.table {
        print!("{}", preview::render_preview(table, 0));
        return Ok(());
    }
    let output = write.output.as_deref().map(io_utils::resolve_output_path);
    let writer = io_utils::open_output(output.as_deref())?;
    export::write_csv(table, writer)?;
    if let Some(path) = &output {
        info!("Wrote {} row(s) to {:?}", table.row_count(), path);
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
