use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::any::AnyRow;
use sqlx::Row;
use tokio::time;

use super::database::Database;
use crate::errors::ReportError;
use crate::metrics;
use crate::models::record::{RawRecord, Value};
use crate::query::{BuiltQuery, ColumnKind, ColumnSpec};

/// Runs a built query and returns its rows. Implementations never write.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, query: &BuiltQuery) -> Result<Vec<RawRecord>, ReportError>;
}

/// Fetches from the SQL database through the shared [`Database`] handle.
pub struct SqlFetcher {
    db: Arc<Database>,
    timeout: Duration,
}

impl SqlFetcher {
    pub fn new(db: Arc<Database>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Open the pool if needed, then run the query.
    async fn run(&self, query: &BuiltQuery) -> Result<Vec<AnyRow>, ReportError> {
        let pool = self.db.pool().await?;

        let mut q = sqlx::query(&query.sql);
        for value in &query.binds {
            q = q.bind(value.clone());
        }

        q.fetch_all(pool).await.map_err(|e| {
            tracing::error!(domain = query.domain.name(), "report query failed: {}", e);
            ReportError::from(e)
        })
    }
}

#[async_trait]
impl Fetcher for SqlFetcher {
    /// The timeout bounds the whole round trip, connecting included.
    async fn fetch(&self, query: &BuiltQuery) -> Result<Vec<RawRecord>, ReportError> {
        let started = Instant::now();

        let rows = match time::timeout(self.timeout, self.run(query)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::error!(
                    domain = query.domain.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "report query timed out"
                );
                return Err(ReportError::Connection(format!(
                    "query exceeded the {}s timeout",
                    self.timeout.as_secs()
                )));
            }
        };

        let elapsed = started.elapsed();
        metrics::observe_fetch(query.domain.name(), elapsed.as_secs_f64());
        tracing::debug!(
            domain = query.domain.name(),
            rows = rows.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "fetched report rows"
        );

        rows.iter()
            .map(|row| decode_row(row, query.columns()))
            .collect()
    }
}

fn decode_row(row: &AnyRow, columns: &[ColumnSpec]) -> Result<RawRecord, ReportError> {
    let mut record = RawRecord::new();
    for column in columns {
        let value = match column.kind {
            ColumnKind::Text => Value::from(row.try_get::<Option<String>, _>(column.name)?),
            ColumnKind::Integer => Value::from(row.try_get::<Option<i64>, _>(column.name)?),
            ColumnKind::Decimal => match row.try_get::<Option<String>, _>(column.name)? {
                Some(raw) => Value::decimal(parse_decimal(column.name, &raw)?),
                None => Value::Null,
            },
        };
        record.set(column.name, value);
    }
    Ok(record)
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, ReportError> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| {
            ReportError::Query(format!("column {} holds non-numeric value '{}': {}", column, raw, e))
        })
}
