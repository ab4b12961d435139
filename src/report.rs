//! Report catalog and the Query → Fetch → Aggregate → Cache pipeline.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime, Utc};
use serde::Serialize;

use crate::aggregate::{aggregate, GroupSpec, MetricDef, SortKey, SortOrder};
use crate::cache::ResultCache;
use crate::errors::ReportError;
use crate::metrics;
use crate::models::{Report, Snapshot, TimeWindow};
use crate::query::{Domain, QueryBuilder};
use crate::store::Fetcher;

/// Transaction status counted as approved.
pub const APPROVED_STATUS: &str = "APPROVED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    TicketsByStatus,
    TicketsByUser,
    TicketsByDay,
    TransactionsByGateway,
    TransactionsByCardType,
    TransactionsByStatus,
}

impl ReportKind {
    pub const ALL: [ReportKind; 6] = [
        ReportKind::TicketsByStatus,
        ReportKind::TicketsByUser,
        ReportKind::TicketsByDay,
        ReportKind::TransactionsByGateway,
        ReportKind::TransactionsByCardType,
        ReportKind::TransactionsByStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::TicketsByStatus => "tickets-by-status",
            ReportKind::TicketsByUser => "tickets-by-user",
            ReportKind::TicketsByDay => "tickets-by-day",
            ReportKind::TransactionsByGateway => "transactions-by-gateway",
            ReportKind::TransactionsByCardType => "transactions-by-card-type",
            ReportKind::TransactionsByStatus => "transactions-by-status",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ReportKind::TicketsByStatus => "Solved tickets per status with their share of the total",
            ReportKind::TicketsByUser => "Solved tickets per technician and status",
            ReportKind::TicketsByDay => "Solved tickets per day",
            ReportKind::TransactionsByGateway => "Volume, amount and success rate per payment gateway",
            ReportKind::TransactionsByCardType => "Volume, amount and success rate per card type",
            ReportKind::TransactionsByStatus => "Transactions and amount per status",
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            ReportKind::TicketsByStatus | ReportKind::TicketsByUser | ReportKind::TicketsByDay => {
                Domain::Tickets
            }
            _ => Domain::Transactions,
        }
    }

    pub fn group_spec(self) -> GroupSpec {
        match self {
            ReportKind::TicketsByStatus => GroupSpec::by(&["status"])
                .metric(MetricDef::count("tickets"))
                .metric(MetricDef::share("share", "tickets")),
            ReportKind::TicketsByUser => GroupSpec::by(&["assigned_user", "status"])
                .metric(MetricDef::count("tickets"))
                .sort_by(SortKey::metric("tickets", SortOrder::Desc)),
            ReportKind::TicketsByDay => GroupSpec::by(&["solved_date"])
                .metric(MetricDef::count("tickets"))
                .sort_by(SortKey::dimension("solved_date", SortOrder::Asc)),
            ReportKind::TransactionsByGateway => gateway_metrics(&["gateway"]),
            ReportKind::TransactionsByCardType => gateway_metrics(&["card_type"]),
            ReportKind::TransactionsByStatus => GroupSpec::by(&["status"])
                .metric(MetricDef::count("transactions"))
                .metric(MetricDef::sum_decimal("amount", "amount"))
                .metric(MetricDef::share("share", "transactions"))
                .sort_by(SortKey::metric("transactions", SortOrder::Desc)),
        }
    }
}

fn gateway_metrics(dimensions: &[&str]) -> GroupSpec {
    GroupSpec::by(dimensions)
        .metric(MetricDef::count("transactions"))
        .metric(MetricDef::sum_decimal("amount", "amount"))
        .metric(MetricDef::count_where("approved", "status", APPROVED_STATUS))
        .metric(MetricDef::ratio("success_rate", "approved", "transactions"))
        .sort_by(SortKey::metric("transactions", SortOrder::Desc))
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown report '{}'", s))
    }
}

/// Catalog listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub domain: Domain,
    pub description: &'static str,
    pub spec: GroupSpec,
}

impl From<ReportKind> for CatalogEntry {
    fn from(kind: ReportKind) -> Self {
        Self {
            name: kind.name(),
            domain: kind.domain(),
            description: kind.description(),
            spec: kind.group_spec(),
        }
    }
}

/// Result cache key. Explicit windows key on their bounds; relative windows
/// key on `hours:N`, so they stay cached for the whole TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub report: ReportKind,
    pub window: String,
}

impl CacheKey {
    pub fn new(report: ReportKind, window: &TimeWindow) -> Self {
        Self {
            report,
            window: window.to_string(),
        }
    }
}

/// Where one domain's records come from.
struct Source {
    fetcher: Arc<dyn Fetcher>,
    builder: QueryBuilder,
}

pub struct Reporter {
    sources: HashMap<Domain, Source>,
    cache: ResultCache<CacheKey, Snapshot>,
}

impl Reporter {
    /// A reporter with no sources; add one per served domain with
    /// [`Reporter::with_source`].
    pub fn new(ttl: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            cache: ResultCache::new(ttl),
        }
    }

    pub fn with_source(
        mut self,
        domain: Domain,
        fetcher: Arc<dyn Fetcher>,
        builder: QueryBuilder,
    ) -> Self {
        self.sources.insert(domain, Source { fetcher, builder });
        self
    }

    /// Whether a database is configured for `kind`'s domain.
    pub fn serves(&self, kind: ReportKind) -> bool {
        self.sources.contains_key(&kind.domain())
    }

    /// Served catalog reports, in catalog order.
    pub fn kinds(&self) -> Vec<ReportKind> {
        ReportKind::ALL
            .into_iter()
            .filter(|kind| self.serves(*kind))
            .collect()
    }

    /// Produce `kind` for `window`, resolving relative windows against the
    /// local clock. Never fails: errors come back as an empty report with a
    /// user-facing message.
    pub async fn report(&self, kind: ReportKind, window: &TimeWindow) -> Report {
        self.report_at(kind, window, Local::now().naive_local()).await
    }

    pub async fn report_at(
        &self,
        kind: ReportKind,
        window: &TimeWindow,
        now: NaiveDateTime,
    ) -> Report {
        let name = kind.name();

        if let Err(err) = window.validate() {
            metrics::record_failure(name, err.kind());
            tracing::warn!(report = name, window = %window, "rejected report window: {}", err);
            return Report::failed(name, None, &err);
        }

        let started = Instant::now();
        let key = CacheKey::new(kind, window);
        let outcome = self
            .cache
            .get_or_compute(key, || self.compute(kind, window, now))
            .await;
        metrics::record_cache_lookup(name, outcome.hit);

        if let Some(err) = outcome.error {
            metrics::record_failure(name, err.kind());
            tracing::error!(report = name, kind = err.kind(), "report failed: {}", err);
            return Report::failed(name, window.resolve(now).ok(), &err);
        }

        tracing::info!(
            report = name,
            rows = outcome.value.rows.len(),
            hit = outcome.hit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "report served"
        );
        Report::from_snapshot(name, outcome.value, outcome.hit)
    }

    /// One uncached Query → Fetch → Aggregate pass.
    pub async fn compute(
        &self,
        kind: ReportKind,
        window: &TimeWindow,
        now: NaiveDateTime,
    ) -> Result<Snapshot, ReportError> {
        let domain = kind.domain();
        let source = self.sources.get(&domain).ok_or_else(|| {
            ReportError::Connection(format!("no database configured for {} reports", domain.name()))
        })?;
        let query = source.builder.build(domain, window, now)?;
        let records = source.fetcher.fetch(&query).await?;
        let rows = aggregate(&records, &kind.group_spec());
        Ok(Snapshot {
            window: query.window,
            rows,
            computed_at: Utc::now(),
        })
    }

    /// Manual refresh: drop every cached report so the next read recomputes.
    pub fn refresh(&self) -> usize {
        let invalidated = self.cache.invalidate_all();
        tracing::info!(invalidated, "report cache invalidated");
        invalidated
    }

    /// Recompute one report, replacing its cached entry. Other cached
    /// windows are left alone.
    pub async fn refresh_report(&self, kind: ReportKind, window: &TimeWindow) -> Report {
        self.cache.invalidate(&CacheKey::new(kind, window));
        self.report(kind, window).await
    }

    pub fn last_error(&self, kind: ReportKind, window: &TimeWindow) -> Option<String> {
        self.cache.last_error(&CacheKey::new(kind, window))
    }

    pub fn cache(&self) -> &ResultCache<CacheKey, Snapshot> {
        &self.cache
    }
}
