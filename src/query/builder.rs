use chrono::NaiveDateTime;

use super::dialect::Dialect;
use super::domain::{ColumnSpec, Domain};
use crate::errors::ReportError;
use crate::models::window::{ResolvedWindow, TimeWindow};

/// Per-deployment knobs that shape the domain queries.
#[derive(Debug, Clone)]
pub struct DomainSettings {
    /// GLPI technician group whose tickets are reported.
    pub ticket_group: String,
    /// Transaction error codes excluded from every transaction report.
    pub error_code_denylist: Vec<String>,
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            ticket_group: "NOC".to_string(),
            error_code_denylist: Vec::new(),
        }
    }
}

/// A fully specified read-only query: SQL text plus its bind values in
/// placeholder order. All binds are text; the SQL casts them as needed.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub domain: Domain,
    pub sql: String,
    pub binds: Vec<String>,
    pub window: ResolvedWindow,
}

impl BuiltQuery {
    pub fn columns(&self) -> &'static [ColumnSpec] {
        self.domain.columns()
    }
}

/// Collects bind values while a domain renders its SQL.
pub(crate) struct Params {
    dialect: Dialect,
    window: ResolvedWindow,
    values: Vec<String>,
}

impl Params {
    fn new(dialect: Dialect, window: ResolvedWindow) -> Self {
        Self {
            dialect,
            window,
            values: Vec::new(),
        }
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Record a bind value and return its placeholder.
    pub(crate) fn push(&mut self, value: String) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    pub(crate) fn push_start(&mut self) -> String {
        let bound = self.window.start_bound();
        self.push(bound)
    }

    pub(crate) fn push_end(&mut self) -> String {
        let bound = self.window.end_bound();
        self.push(bound)
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    dialect: Dialect,
    settings: DomainSettings,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect, settings: DomainSettings) -> Self {
        Self { dialect, settings }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Build the query for `domain` over `window`, resolving relative
    /// windows against `now`. Rejects inverted or non-positive windows
    /// before any SQL is produced.
    pub fn build(
        &self,
        domain: Domain,
        window: &TimeWindow,
        now: NaiveDateTime,
    ) -> Result<BuiltQuery, ReportError> {
        let resolved = window.resolve(now)?;
        let mut params = Params::new(self.dialect, resolved);
        let sql = domain.render(&self.settings, &mut params);

        tracing::debug!(
            domain = domain.name(),
            binds = params.values.len(),
            start = %resolved.start,
            end = %resolved.end,
            "built report query"
        );

        Ok(BuiltQuery {
            domain,
            sql,
            binds: params.values,
            window: resolved,
        })
    }

    pub fn build_hours_back(
        &self,
        domain: Domain,
        hours: i64,
        now: NaiveDateTime,
    ) -> Result<BuiltQuery, ReportError> {
        self.build(domain, &TimeWindow::HoursBack(hours), now)
    }
}
