//! Mapping from a (usually aggregated) table to a declarative chart spec.
//!
//! A chart spec names the fields a renderer should bind to each channel. It does
//! not choose bins or scales; those stay with the renderer.

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::debug;
use serde::Serialize;
use serde_json::{Map, Number, Value as JsonValue};

use crate::{
    aggregate::VALUE_COLUMN,
    data::parse_number,
    error::ChartError,
    schema::ColumnType,
    table::{Column, Table},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Histogram,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Histogram => "histogram",
        }
    }
}

/// Optional explicit channel selections; unset channels use defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisSelection {
    pub x: Option<String>,
    pub y: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartSpec {
    Bar {
        x: String,
        y: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    Line {
        x: String,
        y: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
    Pie {
        names: String,
        values: String,
    },
    Histogram {
        x: String,
    },
}

impl ChartSpec {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartSpec::Bar { .. } => ChartKind::Bar,
            ChartSpec::Line { .. } => ChartKind::Line,
            ChartSpec::Pie { .. } => ChartKind::Pie,
            ChartSpec::Histogram { .. } => ChartKind::Histogram,
        }
    }

    /// Columns referenced by the spec, in channel order.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            ChartSpec::Bar { x, y, color } | ChartSpec::Line { x, y, color } => {
                let mut fields = vec![x.as_str(), y.as_str()];
                if let Some(color) = color {
                    fields.push(color.as_str());
                }
                fields
            }
            ChartSpec::Pie { names, values } => vec![names.as_str(), values.as_str()],
            ChartSpec::Histogram { x } => vec![x.as_str()],
        }
    }
}

pub fn map_chart(
    table: &Table,
    kind: ChartKind,
    selection: &AxisSelection,
) -> Result<ChartSpec, ChartError> {
    if table.column_count() == 0 {
        return Err(ChartError::EmptyTable);
    }

    if kind == ChartKind::Histogram {
        let x = match &selection.x {
            Some(name) => require_numeric(table, name, "x", kind)?,
            None => table
                .columns()
                .iter()
                .find(|c| c.kind == ColumnType::Numeric)
                .map(|c| c.name.clone())
                .ok_or(ChartError::NoNumericColumn)?,
        };
        return Ok(ChartSpec::Histogram { x });
    }

    let y = match &selection.y {
        Some(name) => name.clone(),
        None => default_measure(table),
    };
    let y = require_numeric(table, &y, "y", kind)?;
    let groups: Vec<&Column> = table.columns().iter().filter(|c| c.name != y).collect();
    let x = match &selection.x {
        Some(name) => require_column(table, name)?.name.clone(),
        None => groups
            .first()
            .map(|c| c.name.clone())
            .ok_or(ChartError::MissingAxis { role: "x" })?,
    };

    let spec = if kind == ChartKind::Pie {
        if selection.color.is_some() {
            debug!("Ignoring color selection for pie chart");
        }
        ChartSpec::Pie { names: x, values: y }
    } else {
        let color = match &selection.color {
            Some(name) => Some(require_column(table, name)?.name.clone()),
            None if groups.len() >= 2 => groups
                .iter()
                .find(|c| c.name != x)
                .map(|c| c.name.clone()),
            None => None,
        };
        if kind == ChartKind::Bar {
            ChartSpec::Bar { x, y, color }
        } else {
            ChartSpec::Line { x, y, color }
        }
    };
    debug!("Mapped {} chart over fields {:?}", kind.as_str(), spec.fields());
    Ok(spec)
}

fn default_measure(table: &Table) -> String {
    if table.column_index(VALUE_COLUMN).is_some() {
        return VALUE_COLUMN.to_string();
    }
    table
        .columns()
        .last()
        .map(|c| c.name.clone())
        .unwrap_or_default()
}

fn require_column<'t>(table: &'t Table, name: &str) -> Result<&'t Column, ChartError> {
    table.column(name).ok_or_else(|| ChartError::UnknownColumn {
        column: name.to_string(),
    })
}

fn require_numeric(
    table: &Table,
    name: &str,
    role: &'static str,
    kind: ChartKind,
) -> Result<String, ChartError> {
    let column = require_column(table, name)?;
    if column.kind != ColumnType::Numeric {
        return Err(ChartError::NonNumeric {
            column: name.to_string(),
            role,
            kind: kind.as_str(),
        });
    }
    Ok(column.name.clone())
}

/// A chart spec bundled with the records it binds to.
#[derive(Debug, Clone, Serialize)]
pub struct ChartDocument {
    #[serde(flatten)]
    pub spec: ChartSpec,
    pub data: Vec<Map<String, JsonValue>>,
}

impl ChartDocument {
    pub fn new(table: &Table, spec: ChartSpec) -> Self {
        let fields: Vec<(usize, &Column)> = spec
            .fields()
            .into_iter()
            .filter_map(|name| {
                let idx = table.column_index(name)?;
                Some((idx, &table.columns()[idx]))
            })
            .collect();
        let data = table
            .rows()
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .map(|(idx, column)| {
                        let value = match (row[*idx].as_deref(), column.kind) {
                            (None, _) => JsonValue::Null,
                            (Some(raw), ColumnType::Numeric) => parse_number(raw)
                                .and_then(Number::from_f64)
                                .map(JsonValue::Number)
                                .unwrap_or_else(|| JsonValue::String(raw.to_string())),
                            (Some(raw), _) => JsonValue::String(raw.to_string()),
                        };
                        (column.name.clone(), value)
                    })
                    .collect()
            })
            .collect();
        Self { spec, data }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing chart spec to JSON")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing chart spec to YAML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadOptions, load_table};

    fn load(text: &str) -> Table {
        load_table(text.as_bytes(), &LoadOptions::default()).expect("load table")
    }

    #[test]
    fn bar_uses_second_group_as_color() {
        let table = load("region,product,value\neu,a,3\nus,b,4\n");
        let spec = map_chart(&table, ChartKind::Bar, &AxisSelection::default()).unwrap();
        assert_eq!(
            spec,
            ChartSpec::Bar {
                x: "region".into(),
                y: "value".into(),
                color: Some("product".into())
            }
        );
    }

    #[test]
    fn line_without_second_group_has_no_color() {
        let table = load("day,value\n2024-01-01,3\n2024-01-02,4\n");
        let spec = map_chart(&table, ChartKind::Line, &AxisSelection::default()).unwrap();
        assert_eq!(
            spec,
            ChartSpec::Line {
                x: "day".into(),
                y: "value".into(),
                color: None
            }
        );
    }

    #[test]
    fn pie_maps_names_and_values() {
        let table = load("region,product,value\neu,a,3\n");
        let selection = AxisSelection {
            color: Some("product".into()),
            ..AxisSelection::default()
        };
        let spec = map_chart(&table, ChartKind::Pie, &selection).unwrap();
        assert_eq!(
            spec,
            ChartSpec::Pie {
                names: "region".into(),
                values: "value".into()
            }
        );
    }

    #[test]
    fn histogram_picks_first_numeric_column() {
        let table = load("name,score,age\na,1.5,30\n");
        let spec = map_chart(&table, ChartKind::Histogram, &AxisSelection::default()).unwrap();
        assert_eq!(spec, ChartSpec::Histogram { x: "score".into() });

        let text_only = load("name\na\n");
        assert!(matches!(
            map_chart(&text_only, ChartKind::Histogram, &AxisSelection::default()),
            Err(ChartError::NoNumericColumn)
        ));
    }

    #[test]
    fn measure_must_be_numeric() {
        let table = load("region,label\neu,x\n");
        assert!(matches!(
            map_chart(&table, ChartKind::Bar, &AxisSelection::default()),
            Err(ChartError::NonNumeric { role: "y", .. })
        ));
    }

    #[test]
    fn document_serializes_numbers_as_numbers() {
        let table = load("region,value\neu,3\nus,\n");
        let spec = map_chart(&table, ChartKind::Bar, &AxisSelection::default()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&ChartDocument::new(&table, spec).to_json().unwrap()).unwrap();
        assert_eq!(json["kind"], "bar");
        assert_eq!(json["x"], "region");
        assert!(json.get("color").is_none());
        assert_eq!(json["data"][0]["value"], 3.0);
        assert!(json["data"][1]["value"].is_null());
    }
}
