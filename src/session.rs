//! Explicit per-session state.
//!
//! A [`Session`] owns the loaded source tables and the current result. Each
//! operation takes an immutable request, runs the pure core function, and on
//! success replaces the current table wholesale. On failure the previous
//! state is left untouched and the typed error is returned to the caller.

use log::info;

use crate::{
    aggregate::{AggregationSpec, aggregate},
    append::append_tables,
    chart::{AxisSelection, ChartDocument, ChartKind, map_chart},
    error::SessionError,
    export::{Export, export_csv},
    filter::FilterRequest,
    loader::{LoadOptions, load_table},
    merge::{CollisionPolicy, JoinKind, MergeSpec, MergeWarning, merge_tables},
    table::Table,
};

#[derive(Debug, Clone)]
pub struct NamedTable {
    pub name: String,
    pub table: Table,
}

#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    /// One key for every source, or one key per source in load order.
    pub keys: Vec<String>,
    pub kind: JoinKind,
    pub collisions: CollisionPolicy,
}

#[derive(Debug, Default)]
pub struct Session {
    sources: Vec<NamedTable>,
    current: Option<Table>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> &[NamedTable] {
        &self.sources
    }

    pub fn current(&self) -> Option<&Table> {
        self.current.as_ref()
    }

    fn require_current(&self) -> Result<&Table, SessionError> {
        self.current.as_ref().ok_or(SessionError::NoCurrentTable)
    }

    fn publish(&mut self, table: Table) -> &Table {
        self.current.insert(table)
    }

    /// Loads a source and makes it the current table.
    pub fn load_source(
        &mut self,
        name: impl Into<String>,
        bytes: &[u8],
        options: &LoadOptions,
    ) -> Result<&Table, SessionError> {
        let name = name.into();
        let table = load_table(bytes, options)?;
        info!(
            "Loaded '{}': {} row(s), {} column(s)",
            name,
            table.row_count(),
            table.column_count()
        );
        self.sources.push(NamedTable {
            name,
            table: table.clone(),
        });
        Ok(self.publish(table))
    }

    fn named_sources(&self) -> Vec<(&str, &Table)> {
        self.sources
            .iter()
            .map(|s| (s.name.as_str(), &s.table))
            .collect()
    }

    /// Merges every loaded source; skipped sources come back as warnings.
    pub fn merge(&mut self, request: &MergeRequest) -> Result<Vec<MergeWarning>, SessionError> {
        let outcome = {
            let named = self.named_sources();
            let spec =
                MergeSpec::with_keys(&named, &request.keys, request.kind, request.collisions)?;
            merge_tables(&spec)?
        };
        self.publish(outcome.table);
        Ok(outcome.warnings)
    }

    pub fn append(&mut self) -> Result<&Table, SessionError> {
        let table = append_tables(&self.named_sources())?;
        Ok(self.publish(table))
    }

    pub fn apply_filter(&mut self, request: &FilterRequest) -> Result<&Table, SessionError> {
        let filtered = request.apply(self.require_current()?)?;
        Ok(self.publish(filtered))
    }

    pub fn aggregate(&mut self, spec: &AggregationSpec) -> Result<&Table, SessionError> {
        let result = aggregate(self.require_current()?, spec)?;
        Ok(self.publish(result))
    }

    pub fn chart(
        &self,
        kind: ChartKind,
        selection: &AxisSelection,
    ) -> Result<ChartDocument, SessionError> {
        let table = self.require_current()?;
        let spec = map_chart(table, kind, selection)?;
        Ok(ChartDocument::new(table, spec))
    }

    pub fn export(&self, base_name: &str) -> Result<Export, SessionError> {
        Ok(export_csv(self.require_current()?, base_name)?)
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.current = None;
    }
}
