//! In-memory fetchers shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use reporter::errors::ReportError;
use reporter::models::RawRecord;
use reporter::query::{BuiltQuery, Dialect, Domain, DomainSettings, QueryBuilder};
use reporter::report::Reporter;
use reporter::store::Fetcher;

/// Serves fixed rows per domain and counts round trips. Can be switched to
/// fail with a given error.
#[derive(Default)]
pub struct MemoryFetcher {
    pub tickets: Vec<RawRecord>,
    pub transactions: Vec<RawRecord>,
    pub calls: AtomicUsize,
    pub failure: Mutex<Option<ReportError>>,
    pub last_binds: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn with_tickets(tickets: Vec<RawRecord>) -> Self {
        Self {
            tickets,
            ..Self::default()
        }
    }

    pub fn with_transactions(transactions: Vec<RawRecord>) -> Self {
        Self {
            transactions,
            ..Self::default()
        }
    }

    pub fn failing(err: ReportError) -> Self {
        let fetcher = Self::default();
        fetcher.fail_with(Some(err));
        fetcher
    }

    pub fn fail_with(&self, err: Option<ReportError>) {
        *self.failure.lock().unwrap() = err;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, query: &BuiltQuery) -> Result<Vec<RawRecord>, ReportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_binds.lock().unwrap() = query.binds.clone();
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(match query.domain {
            Domain::Tickets => self.tickets.clone(),
            Domain::Transactions => self.transactions.clone(),
        })
    }
}

pub fn ticket(id: i64, user: &str, status: &str, date: &str) -> RawRecord {
    RawRecord::new()
        .with("ticket_id", id)
        .with("assigned_user", user)
        .with("status", status)
        .with("solved_date", date)
        .with("group_name", "NOC")
}

pub fn transaction(id: i64, gateway: &str, card: &str, status: &str, amount: &str) -> RawRecord {
    RawRecord::new()
        .with("transaction_id", id)
        .with("gateway", gateway)
        .with("card_type", card)
        .with("status", status)
        .with("amount", amount.parse::<Decimal>().unwrap())
}

pub const TTL: Duration = Duration::from_secs(300);

/// Dialect each domain is read with: GLPI on MySQL, payments on PostgreSQL.
pub fn dialect_for(domain: Domain) -> Dialect {
    match domain {
        Domain::Tickets => Dialect::MySql,
        Domain::Transactions => Dialect::Postgres,
    }
}

/// Reporter serving only `domains`, all read through `fetcher`.
pub fn reporter_for(fetcher: Arc<MemoryFetcher>, domains: &[Domain]) -> Reporter {
    domains.iter().fold(Reporter::new(TTL), |reporter, &domain| {
        reporter.with_source(
            domain,
            fetcher.clone(),
            QueryBuilder::new(dialect_for(domain), DomainSettings::default()),
        )
    })
}

/// Reporter serving both domains through one fetcher.
pub fn new_reporter(fetcher: Arc<MemoryFetcher>) -> Reporter {
    reporter_for(fetcher, &[Domain::Tickets, Domain::Transactions])
}
